//! `PostgreSQL` implementation of the billing storage ports.

use async_trait::async_trait;
use bursar::{
    billing::{
        BillItem, BillLine, BillableProduct, BillingSchedulePeriod, ProductPrice, Tax,
        UpcomingBillItem,
    },
    discounts::Discount,
    ids::{
        BillingScheduleId, BillingSchedulePeriodId, DiscountId, OrderId, ProductId, StudentId,
        StudentProductId, TaxId,
    },
    pricing::BillingRatio,
    students::StudentProduct,
};
use jiff::{Timestamp, civil::Date};

use crate::{
    context::OrgContext,
    database::{PgStore, PgUnitOfWork},
    domain::{
        billing::{
            ports::{BillingStore, BillingTx},
            repositories::{PgBillItemsRepository, PgCatalogRepository, PgSchedulesRepository},
        },
        discounts::repositories::PgDiscountsRepository,
        students::PgStudentsRepository,
    },
};

#[async_trait]
impl BillingStore for PgStore {
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn BillingTx>, sqlx::Error> {
        Ok(Box::new(self.begin_unit(ctx).await?))
    }
}

#[async_trait]
impl BillingTx for PgUnitOfWork {
    async fn due_upcoming_bill_items(
        &mut self,
        today: Date,
    ) -> Result<Vec<UpcomingBillItem>, sqlx::Error> {
        PgBillItemsRepository
            .list_due_upcoming_bill_items(self.tx()?, today)
            .await
    }

    async fn student_product(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<StudentProduct, sqlx::Error> {
        PgStudentsRepository
            .get_student_product(self.tx()?, student_product)
            .await
    }

    async fn recurring_bill_items(
        &mut self,
        order: &OrderId,
        product: &ProductId,
    ) -> Result<Vec<BillItem>, sqlx::Error> {
        PgBillItemsRepository
            .list_recurring_bill_items(self.tx()?, order, product)
            .await
    }

    async fn billing_schedule_period(
        &mut self,
        period: &BillingSchedulePeriodId,
    ) -> Result<BillingSchedulePeriod, sqlx::Error> {
        PgSchedulesRepository
            .get_billing_schedule_period(self.tx()?, period)
            .await
    }

    async fn last_billing_schedule_period(
        &mut self,
        schedule: &BillingScheduleId,
    ) -> Result<BillingSchedulePeriod, sqlx::Error> {
        PgSchedulesRepository
            .get_last_billing_schedule_period(self.tx()?, schedule)
            .await
    }

    async fn next_billing_schedule_period(
        &mut self,
        current: &BillingSchedulePeriod,
    ) -> Result<BillingSchedulePeriod, sqlx::Error> {
        PgSchedulesRepository
            .get_next_billing_schedule_period(self.tx()?, current)
            .await
    }

    async fn billing_schedule_periods(
        &mut self,
        schedule: &BillingScheduleId,
    ) -> Result<Vec<BillingSchedulePeriod>, sqlx::Error> {
        PgSchedulesRepository
            .list_billing_schedule_periods(self.tx()?, schedule)
            .await
    }

    async fn billable_product(
        &mut self,
        product: &ProductId,
    ) -> Result<BillableProduct, sqlx::Error> {
        PgCatalogRepository
            .get_billable_product(self.tx()?, product)
            .await
    }

    async fn discount(&mut self, discount: &DiscountId) -> Result<Option<Discount>, sqlx::Error> {
        PgDiscountsRepository.get_discount(self.tx()?, discount).await
    }

    async fn tax(&mut self, tax: &TaxId) -> Result<Option<Tax>, sqlx::Error> {
        PgCatalogRepository.get_tax(self.tx()?, tax).await
    }

    async fn product_prices(
        &mut self,
        product: &ProductId,
        period: &BillingSchedulePeriodId,
    ) -> Result<Vec<ProductPrice>, sqlx::Error> {
        PgCatalogRepository
            .list_product_prices(self.tx()?, product, period)
            .await
    }

    async fn is_enrolled(
        &mut self,
        student: &StudentId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        PgStudentsRepository
            .is_enrolled(self.tx()?, student, at)
            .await
    }

    async fn latest_bill_item_for_period(
        &mut self,
        student_product: &StudentProductId,
        period: &BillingSchedulePeriodId,
    ) -> Result<Option<BillItem>, sqlx::Error> {
        PgBillItemsRepository
            .get_latest_bill_item_for_period(self.tx()?, student_product, period)
            .await
    }

    async fn billing_ratio(
        &mut self,
        period: &BillingSchedulePeriodId,
        from: Date,
    ) -> Result<Option<BillingRatio>, sqlx::Error> {
        PgSchedulesRepository
            .get_billing_ratio(self.tx()?, period, from)
            .await
    }

    async fn insert_bill_item(&mut self, bill_item: &BillLine) -> Result<i64, sqlx::Error> {
        PgBillItemsRepository
            .insert_bill_item(self.tx()?, bill_item)
            .await
    }

    async fn insert_upcoming_bill_item(
        &mut self,
        upcoming: &UpcomingBillItem,
    ) -> Result<(), sqlx::Error> {
        PgBillItemsRepository
            .insert_upcoming_bill_item(self.tx()?, upcoming)
            .await
    }

    async fn mark_upcoming_bill_item_generated(
        &mut self,
        upcoming: &UpcomingBillItem,
        note: Option<&'static str>,
    ) -> Result<(), sqlx::Error> {
        PgBillItemsRepository
            .mark_upcoming_bill_item_generated(self.tx()?, upcoming, note)
            .await
    }

    async fn note_upcoming_bill_item(
        &mut self,
        upcoming: &UpcomingBillItem,
        note: &str,
    ) -> Result<(), sqlx::Error> {
        PgBillItemsRepository
            .note_upcoming_bill_item(self.tx()?, upcoming, note)
            .await
    }

    async fn due_pending_bill_items(&mut self, today: Date) -> Result<Vec<i64>, sqlx::Error> {
        PgBillItemsRepository
            .list_due_pending_bill_items(self.tx()?, today)
            .await
    }

    async fn mark_bill_item_billed(&mut self, sequence_number: i64) -> Result<u64, sqlx::Error> {
        PgBillItemsRepository
            .mark_bill_item_billed(self.tx()?, sequence_number)
            .await
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.finish().await
    }
}
