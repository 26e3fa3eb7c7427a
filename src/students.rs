//! Student Products

use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};

use crate::{
    ids::{LocationId, ProductId, StudentId, StudentProductId},
    lifecycle::{StudentProductLabel, StudentProductStatus},
    segments::{SegmentError, TimestampSegment},
};

/// One purchased product instance for a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProduct {
    /// Student product ID.
    pub id: StudentProductId,

    /// Owning student.
    pub student_id: StudentId,

    /// Location the product was ordered at.
    pub location_id: LocationId,

    /// Purchased product.
    pub product_id: ProductId,

    /// Current status.
    pub status: StudentProductStatus,

    /// Scheduling label.
    pub label: StudentProductLabel,

    /// First day of ownership.
    pub start_date: Date,

    /// Last day of ownership.
    pub end_date: Date,

    /// The student product this one was updated from.
    pub updated_from: Option<StudentProductId>,

    /// The student product that superseded this one.
    pub updated_to: Option<StudentProductId>,

    /// The original student product of an update chain.
    pub root_student_product: Option<StudentProductId>,

    /// Creation time.
    pub created_at: Timestamp,
}

/// Why recurring billing no longer applies to a student product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingSkip {
    /// A newer student product replaced this one.
    Superseded,

    /// The student product was cancelled.
    Cancelled,

    /// The student product is paused.
    Paused,
}

impl BillingSkip {
    /// Execute note left on an upcoming bill item that will never generate.
    #[must_use]
    pub const fn note(self) -> &'static str {
        match self {
            Self::Superseded => "STUDENT_PRODUCT_SUPERSEDED",
            Self::Cancelled => "STUDENT_PRODUCT_CANCELLED",
            Self::Paused => "STUDENT_PRODUCT_PAUSED",
        }
    }
}

impl StudentProduct {
    /// Whether discount tracking may start for this student product.
    #[must_use]
    pub fn is_trackable(&self) -> bool {
        self.status == StudentProductStatus::Ordered || self.label == StudentProductLabel::Created
    }

    /// Reason to stop generating bill items, if any.
    #[must_use]
    pub fn billing_skip(&self) -> Option<BillingSkip> {
        if self.updated_to.is_some() {
            return Some(BillingSkip::Superseded);
        }

        if self.status == StudentProductStatus::Cancelled {
            return Some(BillingSkip::Cancelled);
        }

        if self.label == StudentProductLabel::Paused {
            return Some(BillingSkip::Paused);
        }

        None
    }

    /// The student product whose tracker duration an update-style order revises.
    #[must_use]
    pub fn prior_version(&self) -> &StudentProductId {
        self.updated_from.as_ref().unwrap_or(&self.id)
    }

    /// The student product used for enrollment-price lookups.
    #[must_use]
    pub fn root(&self) -> &StudentProductId {
        self.root_student_product.as_ref().unwrap_or(&self.id)
    }

    /// Ownership window.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Inverted`] when the end date precedes the start date.
    pub fn ownership(&self) -> Result<TimestampSegment, SegmentError> {
        TimestampSegment::new(self.start_date, self.end_date)
    }
}
