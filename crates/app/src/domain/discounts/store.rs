//! `PostgreSQL` implementation of the discount storage ports.

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

use crate::{
    context::OrgContext,
    database::{PgStore, PgUnitOfWork},
    domain::{
        discounts::{
            ports::{SelectionStore, SelectionTx, TagStore, TagTx, TrackerStore, TrackerTx},
            repositories::{PgDiscountsRepository, PgTagsRepository, PgTrackersRepository},
        },
        students::PgStudentsRepository,
    },
    outbox::{OutboxEvent, PgOutboxRepository, notification::NOTIFIED_ROLES},
};

#[async_trait]
impl TrackerStore for PgStore {
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn TrackerTx>, sqlx::Error> {
        Ok(Box::new(self.begin_unit(ctx).await?))
    }
}

#[async_trait]
impl TagStore for PgStore {
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn TagTx>, sqlx::Error> {
        Ok(Box::new(self.begin_unit(ctx).await?))
    }
}

#[async_trait]
impl SelectionStore for PgStore {
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn SelectionTx>, sqlx::Error> {
        Ok(Box::new(self.begin_unit(ctx).await?))
    }
}

#[async_trait]
impl TrackerTx for PgUnitOfWork {
    async fn student_product(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<StudentProduct, sqlx::Error> {
        PgStudentsRepository
            .get_student_product(self.tx()?, student_product)
            .await
    }

    async fn student_products_by_order(
        &mut self,
        order: &OrderId,
    ) -> Result<Vec<StudentProduct>, sqlx::Error> {
        PgStudentsRepository
            .list_student_products_by_order(self.tx()?, order)
            .await
    }

    async fn product_groups(
        &mut self,
        product: &ProductId,
    ) -> Result<Vec<ProductGroup>, sqlx::Error> {
        PgTrackersRepository
            .list_product_groups(self.tx()?, product)
            .await
    }

    async fn active_trackers(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<Vec<StudentDiscountTracker>, sqlx::Error> {
        PgTrackersRepository
            .list_active_trackers(self.tx()?, student_product)
            .await
    }

    async fn insert_tracker(
        &mut self,
        tracker: &NewDiscountTracker,
    ) -> Result<DiscountTrackerId, sqlx::Error> {
        PgTrackersRepository
            .insert_tracker(self.tx()?, tracker)
            .await
    }

    async fn update_tracking_duration(
        &mut self,
        student_product: &StudentProduct,
    ) -> Result<u64, sqlx::Error> {
        PgTrackersRepository
            .update_tracking_duration(self.tx()?, student_product)
            .await
    }

    async fn expire_trackers(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<u64, sqlx::Error> {
        PgTrackersRepository
            .expire_trackers(self.tx()?, student_product)
            .await
    }

    async fn siblings(&mut self, student: &StudentId) -> Result<Vec<StudentId>, sqlx::Error> {
        PgStudentsRepository.list_siblings(self.tx()?, student).await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.finish().await
    }
}

#[async_trait]
impl TagTx for PgUnitOfWork {
    async fn active_trackers_of(
        &mut self,
        students: &[StudentId],
        discount_type: DiscountType,
    ) -> Result<Vec<StudentDiscountTracker>, sqlx::Error> {
        if students.is_empty() {
            return Ok(Vec::new());
        }

        PgTrackersRepository
            .list_active_trackers_of_students(self.tx()?, students, discount_type)
            .await
    }

    async fn discount_tag_ids(
        &mut self,
        discount_type: DiscountType,
    ) -> Result<Vec<DiscountTagId>, sqlx::Error> {
        PgTagsRepository
            .list_discount_tag_ids(self.tx()?, discount_type)
            .await
    }

    async fn soft_delete_user_tags(
        &mut self,
        user: &StudentId,
        discount_type: DiscountType,
    ) -> Result<u64, sqlx::Error> {
        PgTagsRepository
            .soft_delete_user_tags(self.tx()?, user, discount_type)
            .await
    }

    async fn insert_user_tags(&mut self, tags: &[NewUserDiscountTag]) -> Result<u64, sqlx::Error> {
        PgTagsRepository.insert_user_tags(self.tx()?, tags).await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.finish().await
    }
}

#[async_trait]
impl SelectionTx for PgUnitOfWork {
    async fn selection_candidates(
        &mut self,
        today: Date,
    ) -> Result<Vec<StudentProduct>, sqlx::Error> {
        PgDiscountsRepository
            .list_selection_candidates(self.tx()?, today)
            .await
    }

    async fn eligible_discount_tag_ids(
        &mut self,
        student_product: &StudentProduct,
        today: Date,
    ) -> Result<Vec<DiscountTagId>, sqlx::Error> {
        PgDiscountsRepository
            .list_eligible_discount_tag_ids(self.tx()?, student_product, today)
            .await
    }

    async fn tag_discounts(
        &mut self,
        tags: &[DiscountTagId],
        at: Timestamp,
    ) -> Result<Vec<Discount>, sqlx::Error> {
        PgDiscountsRepository
            .list_tag_discounts(self.tx()?, tags, at)
            .await
    }

    async fn product_discounts(
        &mut self,
        product: &ProductId,
        at: Timestamp,
    ) -> Result<Vec<Discount>, sqlx::Error> {
        PgDiscountsRepository
            .list_product_discounts(self.tx()?, product, at)
            .await
    }

    async fn billed_discount(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<Option<DiscountId>, sqlx::Error> {
        PgDiscountsRepository
            .get_billed_discount(self.tx()?, student_product)
            .await
    }

    async fn notification_recipients(
        &mut self,
        location: &LocationId,
    ) -> Result<Vec<UserId>, sqlx::Error> {
        PgDiscountsRepository
            .list_notification_recipients(self.tx()?, location, NOTIFIED_ROLES)
            .await
    }

    async fn enqueue(&mut self, event: &OutboxEvent) -> Result<(), sqlx::Error> {
        PgOutboxRepository.insert_event(self.tx()?, event).await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.finish().await
    }
}
