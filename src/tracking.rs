//! Discount Tracking
//!
//! A [`StudentDiscountTracker`] row records that a student product sat in a
//! sibling or combo eligible product group for the duration of the product.
//! Rows are never edited into a new identity: re-tracking a student product
//! supersedes the active row and links the replacement back to it.

use jiff::{Timestamp, civil::Date};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{
        DiscountTrackerId, LocationId, ProductGroupId, ProductId, StudentId, StudentProductId,
    },
    lifecycle::DiscountType,
    segments::{TimestampSegment, coalesce},
    students::StudentProduct,
};

/// A product group a product belongs to, with the discount it qualifies for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGroup {
    /// Product group ID.
    pub id: ProductGroupId,

    /// Discount the group qualifies for.
    pub discount_type: DiscountType,
}

/// A persisted tracker row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDiscountTracker {
    pub id: DiscountTrackerId,
    pub student_id: StudentId,
    pub location_id: LocationId,
    pub student_product_id: StudentProductId,
    pub product_id: ProductId,
    pub product_group_id: ProductGroupId,
    pub discount_type: DiscountType,

    /// Set once the discount has actually been granted.
    pub discount_status: Option<String>,
    pub discount_start_date: Option<Date>,
    pub discount_end_date: Option<Date>,

    pub student_product_start_date: Date,
    pub student_product_end_date: Date,

    pub updated_from: Option<DiscountTrackerId>,
    pub updated_to: Option<DiscountTrackerId>,
    pub created_at: Timestamp,
}

impl StudentDiscountTracker {
    /// The tracked window, or `None` once the duration was shrunk to nothing.
    #[must_use]
    pub fn window(&self) -> Option<TimestampSegment> {
        TimestampSegment::new(self.student_product_start_date, self.student_product_end_date).ok()
    }
}

/// A tracker row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDiscountTracker {
    pub student_id: StudentId,
    pub location_id: LocationId,
    pub student_product_id: StudentProductId,
    pub product_id: ProductId,
    pub product_group_id: ProductGroupId,
    pub discount_type: DiscountType,
    pub student_product_start_date: Date,
    pub student_product_end_date: Date,

    /// Active row replaced by this one.
    pub supersedes: Option<DiscountTrackerId>,
}

/// Tracker rows to write for one student product.
///
/// One row per tracked discount type. When a product sits in several groups
/// of the same discount type, the group with the lowest ID is tracked so a
/// student product never has two active rows for one discount type.
#[must_use]
pub fn plan_tracking(
    product: &StudentProduct,
    groups: &[ProductGroup],
    active: &[StudentDiscountTracker],
) -> Vec<NewDiscountTracker> {
    if !product.is_trackable() {
        return Vec::new();
    }

    let mut eligible: Vec<&ProductGroup> = groups
        .iter()
        .filter(|group| group.discount_type.is_tracked())
        .collect();

    eligible.sort_by(|a, b| (a.discount_type, &a.id).cmp(&(b.discount_type, &b.id)));

    let mut seen = FxHashSet::default();

    eligible
        .into_iter()
        .filter(|group| seen.insert(group.discount_type))
        .map(|group| NewDiscountTracker {
            student_id: product.student_id.clone(),
            location_id: product.location_id.clone(),
            student_product_id: product.id.clone(),
            product_id: product.product_id.clone(),
            product_group_id: group.id.clone(),
            discount_type: group.discount_type,
            student_product_start_date: product.start_date,
            student_product_end_date: product.end_date,
            supersedes: active
                .iter()
                .find(|tracker| {
                    tracker.student_product_id == product.id
                        && tracker.discount_type == group.discount_type
                        && tracker.updated_to.is_none()
                })
                .map(|tracker| tracker.id.clone()),
        })
        .collect()
}

/// Coalesced windows of a set of tracker rows, in chronological order.
///
/// Rows whose duration was shrunk below a single day are ignored.
#[must_use]
pub fn tracked_segments(trackers: &[StudentDiscountTracker]) -> Vec<TimestampSegment> {
    let mut windows: Vec<TimestampSegment> = trackers
        .iter()
        .filter_map(StudentDiscountTracker::window)
        .collect();

    windows.sort_by_key(|window| (window.start(), window.end()));

    coalesce(windows)
}
