//! Storage ports of the billing services.

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
use mockall::automock;

use crate::context::OrgContext;

#[automock]
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Open a transaction for the organization.
    async fn begin(&self, ctx: &OrgContext) -> Result<Box<dyn BillingTx>, sqlx::Error>;
}

#[automock]
#[async_trait]
pub trait BillingTx: Send {
    /// Upcoming bill items not yet generated whose billing date is on or
    /// before `today`.
    async fn due_upcoming_bill_items(
        &mut self,
        today: Date,
    ) -> Result<Vec<UpcomingBillItem>, sqlx::Error>;

    /// Load a student product, locking it for the rest of the transaction.
    async fn student_product(
        &mut self,
        student_product: &StudentProductId,
    ) -> Result<StudentProduct, sqlx::Error>;

    /// Recurring bill items of an order's product, latest first.
    async fn recurring_bill_items(
        &mut self,
        order: &OrderId,
        product: &ProductId,
    ) -> Result<Vec<BillItem>, sqlx::Error>;

    async fn billing_schedule_period(
        &mut self,
        period: &BillingSchedulePeriodId,
    ) -> Result<BillingSchedulePeriod, sqlx::Error>;

    /// Period of the schedule that ends last.
    async fn last_billing_schedule_period(
        &mut self,
        schedule: &BillingScheduleId,
    ) -> Result<BillingSchedulePeriod, sqlx::Error>;

    /// Period of the same schedule that follows `current`.
    async fn next_billing_schedule_period(
        &mut self,
        current: &BillingSchedulePeriod,
    ) -> Result<BillingSchedulePeriod, sqlx::Error>;

    /// Periods of the schedule in chronological order.
    async fn billing_schedule_periods(
        &mut self,
        schedule: &BillingScheduleId,
    ) -> Result<Vec<BillingSchedulePeriod>, sqlx::Error>;

    async fn billable_product(&mut self, product: &ProductId)
    -> Result<BillableProduct, sqlx::Error>;

    /// The discount, or `None` once it has been deleted.
    async fn discount(&mut self, discount: &DiscountId) -> Result<Option<Discount>, sqlx::Error>;

    /// The tax, or `None` once it has been deleted.
    async fn tax(&mut self, tax: &TaxId) -> Result<Option<Tax>, sqlx::Error>;

    /// Price tiers of the product for the period.
    async fn product_prices(
        &mut self,
        product: &ProductId,
        period: &BillingSchedulePeriodId,
    ) -> Result<Vec<ProductPrice>, sqlx::Error>;

    /// Whether the student was enrolled in the organization at `at`.
    async fn is_enrolled(&mut self, student: &StudentId, at: Timestamp)
    -> Result<bool, sqlx::Error>;

    /// Latest bill item issued for the student product in the period.
    async fn latest_bill_item_for_period(
        &mut self,
        student_product: &StudentProductId,
        period: &BillingSchedulePeriodId,
    ) -> Result<Option<BillItem>, sqlx::Error>;

    /// Ratio billed when the period is entered on `from`.
    async fn billing_ratio(
        &mut self,
        period: &BillingSchedulePeriodId,
        from: Date,
    ) -> Result<Option<BillingRatio>, sqlx::Error>;

    /// Insert a bill item; returns its sequence number.
    async fn insert_bill_item(&mut self, bill_item: &BillLine) -> Result<i64, sqlx::Error>;

    async fn insert_upcoming_bill_item(
        &mut self,
        upcoming: &UpcomingBillItem,
    ) -> Result<(), sqlx::Error>;

    /// Flag an upcoming bill item as generated.
    async fn mark_upcoming_bill_item_generated(
        &mut self,
        upcoming: &UpcomingBillItem,
        note: Option<&'static str>,
    ) -> Result<(), sqlx::Error>;

    /// Record why an upcoming bill item could not be generated.
    async fn note_upcoming_bill_item(
        &mut self,
        upcoming: &UpcomingBillItem,
        note: &str,
    ) -> Result<(), sqlx::Error>;

    /// Sequence numbers of pending bill items billed on or before `today`.
    async fn due_pending_bill_items(&mut self, today: Date) -> Result<Vec<i64>, sqlx::Error>;

    /// Move a pending bill item to billed.
    async fn mark_bill_item_billed(&mut self, sequence_number: i64) -> Result<u64, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;
}
