//! Storage ports of the discount services.
//!
//! Each port hands out one transaction at a time; everything done through a
//! `*Tx` is committed together or not at all.

use async_trait::async_trait;
use bursar::{
    discounts::Discount,
    ids::{
        DiscountId, DiscountTagId, DiscountTrackerId, LocationId, OrderId, ProductId, StudentId,
        StudentProductId, UserId,
    },
    lifecycle::DiscountType,
    students::StudentProduct,
    tags::NewUserDiscountTag,
    tracking::{NewDiscountTracker, ProductGroup, StudentDiscountTracker},
};
use jiff::{Timestamp, civil::Date};
use mockall::automock;

use crate::{context::OrgContext, outbox::OutboxEvent};

#[automock]
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Open a transaction for the organization.
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn TrackerTx>, sqlx::Error>;
}

#[automock]
#[async_trait]
pub trait TrackerTx: Send {
    async fn student_product(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<StudentProduct, sqlx::Error>;

    async fn student_products_by_order(
        &mut self,
        order: &OrderId,
    ) -> Result<Vec<StudentProduct>, sqlx::Error>;

    /// Product groups the product belongs to.
    async fn product_groups(&mut self, product: &ProductId)
    -> Result<Vec<ProductGroup>, sqlx::Error>;

    /// Trackers of the student product that are not superseded.
    async fn active_trackers(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<Vec<StudentDiscountTracker>, sqlx::Error>;

    /// Insert a tracker, linking and retiring the row it supersedes.
    async fn insert_tracker(
        &mut self,
        tracker: &NewDiscountTracker,
    ) -> Result<DiscountTrackerId, sqlx::Error>;

    /// Copy the student product's dates onto its active trackers.
    ///
    /// Returns the number of trackers updated.
    async fn update_tracking_duration(
        &mut self,
        student_product: &StudentProduct,
    ) -> Result<u64, sqlx::Error>;

    /// Delete the student product's active trackers.
    ///
    /// Returns the number of trackers expired.
    async fn expire_trackers(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<u64, sqlx::Error>;

    async fn siblings(&mut self, student: &StudentId) -> Result<Vec<StudentId>, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;
}

#[automock]
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Open a transaction for the organization.
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn TagTx>, sqlx::Error>;
}

#[automock]
#[async_trait]
pub trait TagTx: Send {
    /// Active trackers of any of `students` for the discount type.
    async fn active_trackers_of(
        &mut self,
        students: &[StudentId],
        discount_type: DiscountType,
    ) -> Result<Vec<StudentDiscountTracker>, sqlx::Error>;

    /// Discount tags configured for the discount type.
    async fn discount_tag_ids(
        &mut self,
        discount_type: DiscountType,
    ) -> Result<Vec<DiscountTagId>, sqlx::Error>;

    /// Soft-delete the user's live tags of the discount type.
    async fn soft_delete_user_tags(
        &mut self,
        user: &StudentId,
        discount_type: DiscountType,
    ) -> Result<u64, sqlx::Error>;

    async fn insert_user_tags(&mut self, tags: &[NewUserDiscountTag]) -> Result<u64, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;
}

#[automock]
#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// Open a transaction for the organization.
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn SelectionTx>, sqlx::Error>;
}

#[automock]
#[async_trait]
pub trait SelectionTx: Send {
    /// Ordered recurring student products live on `today`.
    async fn selection_candidates(&mut self, today: Date)
    -> Result<Vec<StudentProduct>, sqlx::Error>;

    /// Discount tags the student holds on `today` that apply to the product.
    async fn eligible_discount_tag_ids(
        &mut self,
        student_product: &StudentProduct,
        today: Date,
    ) -> Result<Vec<DiscountTagId>, sqlx::Error>;

    /// Available discounts linked to any of the tags.
    async fn tag_discounts(
        &mut self,
        tags: &[DiscountTagId],
        at: Timestamp,
    ) -> Result<Vec<Discount>, sqlx::Error>;

    /// Available discounts configured on the product.
    async fn product_discounts(
        &mut self,
        product: &ProductId,
        at: Timestamp,
    ) -> Result<Vec<Discount>, sqlx::Error>;

    /// Discount of the student product's latest bill item.
    async fn billed_discount(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<Option<DiscountId>, sqlx::Error>;

    /// Staff to notify about the location's student products.
    async fn notification_recipients(
        &mut self,
        location: &LocationId,
    ) -> Result<Vec<UserId>, sqlx::Error>;

    async fn enqueue(&mut self, event: &OutboxEvent) -> Result<(), sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;
}
