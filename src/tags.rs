//! User Discount Tags
//!
//! Tags are derived from tracker history and never edited in place: every
//! reconciliation soft deletes the student's sibling tags and inserts the
//! freshly computed set.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{DiscountTagId, StudentId},
    lifecycle::DiscountType,
    segments::overlap,
    tracking::{StudentDiscountTracker, tracked_segments},
};

/// A user discount tag to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserDiscountTag {
    /// Tagged student.
    pub user_id: StudentId,

    /// Discount type the tag grants.
    pub discount_type: DiscountType,

    /// Discount tag granted.
    pub discount_tag_id: DiscountTagId,

    /// First valid day.
    pub start_date: Date,

    /// Last valid day.
    pub end_date: Date,
}

/// Outcome of reconciling one student's sibling tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPlan {
    /// No joint eligibility: soft delete the existing tags only.
    Clear,

    /// Soft delete the existing tags, then insert these.
    Replace(Vec<NewUserDiscountTag>),
}

impl TagPlan {
    /// Tags inserted by the plan.
    #[must_use]
    pub fn tags(&self) -> &[NewUserDiscountTag] {
        match self {
            Self::Clear => &[],
            Self::Replace(tags) => tags,
        }
    }
}

/// Sibling discount tags for `student`.
///
/// One tag is produced for each window in which the student and any of their
/// siblings both held a tracked product, times each discount tag of the
/// sibling discount type.
#[must_use]
pub fn plan_sibling_tags(
    student: &StudentId,
    own: &[StudentDiscountTracker],
    siblings: &[StudentDiscountTracker],
    discount_tags: &[DiscountTagId],
) -> TagPlan {
    if own.is_empty() || siblings.is_empty() {
        return TagPlan::Clear;
    }

    let windows = overlap(&tracked_segments(own), &tracked_segments(siblings));

    let tags = windows
        .iter()
        .flat_map(|window| {
            discount_tags.iter().map(move |tag| NewUserDiscountTag {
                user_id: student.clone(),
                discount_type: DiscountType::Sibling,
                discount_tag_id: tag.clone(),
                start_date: window.start(),
                end_date: window.end(),
            })
        })
        .collect();

    TagPlan::Replace(tags)
}
