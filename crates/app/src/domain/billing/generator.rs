//! Recurring bill item generator.

use std::sync::Arc;

use async_trait::async_trait;
use bursar::{
    billing::{NextBillItem, UpcomingBillItem, is_last_period, next_bill_item, price_for},
    ids::BillingSchedulePeriodId,
    students::StudentProduct,
};
use mockall::automock;
use rust_decimal::Decimal;
use tracing::{Span, debug, info, warn};

use crate::{
    batch::{AsOf, BatchOutcome, report},
    context::OrgContext,
    domain::billing::{
        errors::{BillingError, GenerationError},
        ports::{BillingStore, BillingTx},
    },
};

/// Note left on the upcoming bill item of a schedule's last period.
pub const LAST_BILL_ITEM_NOTE: &str = "LAST_BILL_ITEM";

/// What happened to one upcoming bill item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    /// The next period was billed.
    Generated(i64),

    /// The current period is the schedule's last.
    LastBillItem,

    /// The student product no longer bills.
    Skipped,
}

#[automock]
#[async_trait]
pub trait BillItemGeneratorService: Send + Sync {
    /// Generate the next period's bill item for every upcoming bill item due
    /// on or before `as_of`.
    async fn generate(&self, ctx: &OrgContext, as_of: AsOf) -> Result<BatchOutcome, BillingError>;
}

pub struct RecurringBillItemGenerator {
    store: Arc<dyn BillingStore>,
}

impl RecurringBillItemGenerator {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    async fn due(&self, ctx: &OrgContext, as_of: AsOf) -> Result<Vec<UpcomingBillItem>, BillingError> {
        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(BillingError::UpcomingBillItems)?;

        let due = tx
            .due_upcoming_bill_items(as_of.today)
            .await
            .map_err(BillingError::UpcomingBillItems)?;

        tx.commit().await.map_err(BillingError::UpcomingBillItems)?;

        Ok(due)
    }

    async fn generate_one(
        &self,
        ctx: &OrgContext,
        upcoming: &UpcomingBillItem,
        as_of: AsOf,
    ) -> Result<Generation, GenerationError> {
        let storage = |operation| GenerationError::storage(&upcoming.student_product_id, operation);

        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(storage("begin transaction"))?;

        let product = tx
            .student_product(&upcoming.student_product_id)
            .await
            .map_err(storage("load student product"))?;

        if let Some(skip) = product.billing_skip() {
            debug!(student_product_id = %product.id, ?skip, "student product no longer bills");

            tx.mark_upcoming_bill_item_generated(upcoming, Some(skip.note()))
                .await
                .map_err(storage("mark skipped bill item"))?;

            tx.commit().await.map_err(storage("commit skipped bill item"))?;

            return Ok(Generation::Skipped);
        }

        let bill_items = tx
            .recurring_bill_items(&upcoming.order_id, &upcoming.product_id)
            .await
            .map_err(storage("load recurring bill items"))?;

        let Some(latest) = bill_items.first() else {
            return Err(GenerationError::BillItemNotFound {
                order: upcoming.order_id.clone(),
                product: upcoming.product_id.clone(),
            });
        };

        let current = tx
            .billing_schedule_period(&upcoming.billing_schedule_period_id)
            .await
            .map_err(storage("load billing schedule period"))?;

        let last = tx
            .last_billing_schedule_period(&current.billing_schedule_id)
            .await
            .map_err(storage("load last billing schedule period"))?;

        if is_last_period(&current, &last) {
            tx.mark_upcoming_bill_item_generated(upcoming, Some(LAST_BILL_ITEM_NOTE))
                .await
                .map_err(storage("mark last bill item"))?;

            tx.commit().await.map_err(storage("commit last bill item"))?;

            return Ok(Generation::LastBillItem);
        }

        let period = tx
            .next_billing_schedule_period(&current)
            .await
            .map_err(storage("load next billing schedule period"))?;

        let discount = match latest.line.discount.as_ref() {
            Some(billed) => match tx
                .discount(&billed.discount_id)
                .await
                .map_err(storage("load discount"))?
            {
                Some(discount) => {
                    let carried = bill_items
                        .iter()
                        .filter(|item| {
                            item.line
                                .discount
                                .as_ref()
                                .is_some_and(|d| d.discount_id == discount.id)
                        })
                        .count();

                    discount.still_applies(carried, as_of.now).then_some(discount)
                }
                None => {
                    debug!(discount_id = %billed.discount_id, "billed discount no longer exists");

                    None
                }
            },
            None => None,
        };

        let tax = match upcoming.tax_id.as_ref() {
            Some(tax) => tx.tax(tax).await.map_err(storage("load tax"))?,
            None => None,
        };

        let price = tier_price(tx.as_mut(), &product, &period.id).await?;

        let generated = next_bill_item(NextBillItem {
            latest,
            period: &period,
            price,
            discount: discount.as_ref(),
            tax: tax.as_ref(),
            today: as_of.today,
        })
        .map_err(|source| GenerationError::Pricing {
            student_product: product.id.clone(),
            source,
        })?;

        let sequence_number = tx
            .insert_bill_item(&generated.bill_item)
            .await
            .map_err(storage("insert bill item"))?;

        tx.insert_upcoming_bill_item(&generated.upcoming)
            .await
            .map_err(storage("insert upcoming bill item"))?;

        tx.mark_upcoming_bill_item_generated(upcoming, None)
            .await
            .map_err(storage("mark upcoming bill item generated"))?;

        tx.commit().await.map_err(storage("commit bill item"))?;

        Ok(Generation::Generated(sequence_number))
    }

    /// Leave the failure on the upcoming bill item so staff can see it.
    async fn note_failure(&self, ctx: &OrgContext, upcoming: &UpcomingBillItem, note: &str) {
        let noted = async {
            let mut tx = self.store.begin(ctx).await?;
            tx.note_upcoming_bill_item(upcoming, note).await?;
            tx.commit().await
        };

        if let Err(error) = noted.await {
            warn!(
                student_product_id = %upcoming.student_product_id,
                error = %report(&error),
                "failed to note bill item generation failure"
            );
        }
    }
}

impl std::fmt::Debug for RecurringBillItemGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringBillItemGenerator").finish_non_exhaustive()
    }
}

#[async_trait]
impl BillItemGeneratorService for RecurringBillItemGenerator {
    #[tracing::instrument(
        name = "billing.generator.generate",
        skip(self, ctx),
        fields(
            organization = %ctx.organization,
            today = %as_of.today,
            due = tracing::field::Empty,
            generated = tracing::field::Empty,
        ),
        err
    )]
    async fn generate(&self, ctx: &OrgContext, as_of: AsOf) -> Result<BatchOutcome, BillingError> {
        let due = self.due(ctx, as_of).await?;

        let mut outcome = BatchOutcome::new();
        let mut generated = 0_usize;

        for upcoming in &due {
            match self.generate_one(ctx, upcoming, as_of).await {
                Ok(generation) => {
                    if let Generation::Generated(sequence_number) = generation {
                        generated += 1;

                        debug!(
                            student_product_id = %upcoming.student_product_id,
                            sequence_number,
                            "generated next bill item"
                        );
                    }

                    outcome.record_success();
                }
                Err(error) => {
                    let note = report(&error);

                    warn!(
                        order_id = %upcoming.order_id,
                        product_id = %upcoming.product_id,
                        student_product_id = %upcoming.student_product_id,
                        error = %note,
                        "failed to generate next bill item"
                    );

                    self.note_failure(ctx, upcoming, &note).await;

                    outcome.record_failure(&error);
                }
            }
        }

        let span = Span::current();
        span.record("due", due.len());
        span.record("generated", generated);

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            generated,
            "generated recurring bill items"
        );

        Ok(outcome)
    }
}

/// The student's price for the period: enrolled when they were enrolled
/// when the root student product was created.
async fn tier_price(
    tx: &mut dyn BillingTx,
    product: &StudentProduct,
    period: &BillingSchedulePeriodId,
) -> Result<Decimal, GenerationError> {
    let storage = |operation| GenerationError::storage(&product.id, operation);

    let created_at = if product.root() == &product.id {
        product.created_at
    } else {
        tx.student_product(product.root())
            .await
            .map_err(storage("load root student product"))?
            .created_at
    };

    let enrolled = tx
        .is_enrolled(&product.student_id, created_at)
        .await
        .map_err(storage("check enrollment"))?;

    let prices = tx
        .product_prices(&product.product_id, period)
        .await
        .map_err(storage("load product prices"))?;

    price_for(&prices, enrolled)
        .map(|price| price.price)
        .ok_or_else(|| GenerationError::PriceNotFound {
            product: product.product_id.clone(),
            period: period.clone(),
        })
}

#[cfg(test)]
mod tests {
    use bursar::{
        billing::{BillItem, BillLine, BilledDiscount, BillingSchedulePeriod, ProductPrice, Tax},
        ids::StudentProductId,
        lifecycle::{
            BillingStatus, BillingType, ProductPriceType, StudentProductStatus, TaxCategory,
        },
        pricing::DiscountAmount,
    };
    use jiff::{Timestamp, civil::date};
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;
    use crate::{
        domain::billing::ports::{MockBillingStore, MockBillingTx},
        test::fixtures::{discount, org, student_product},
    };

    fn as_of() -> AsOf {
        AsOf::new(Timestamp::UNIX_EPOCH, date(2024, 3, 25))
    }

    fn upcoming() -> UpcomingBillItem {
        UpcomingBillItem {
            order_id: "order-1".into(),
            product_id: "product-1".into(),
            student_product_id: "sp-1".into(),
            billing_schedule_period_id: "period-3".into(),
            billing_date: date(2024, 3, 25),
            product_description: "Monthly lessons".to_string(),
            discount_id: None,
            tax_id: Some("tax-1".into()),
            is_generated: false,
            execute_note: None,
        }
    }

    fn period(id: &str, month: i8) -> BillingSchedulePeriod {
        let start = date(2024, month, 1);

        BillingSchedulePeriod {
            id: id.into(),
            billing_schedule_id: "schedule-1".into(),
            name: format!("period {month}"),
            start_date: start,
            end_date: start.last_of_month(),
            billing_date: date(2024, month - 1, 25),
        }
    }

    fn bill_item(sequence_number: i64, discount: Option<BilledDiscount>) -> BillItem {
        BillItem {
            sequence_number,
            line: BillLine {
                order_id: "order-1".into(),
                student_id: "student-1".into(),
                location_id: "location-1".into(),
                student_product_id: "sp-1".into(),
                product_id: "product-1".into(),
                product_description: "Monthly lessons".to_string(),
                billing_status: BillingStatus::Billed,
                billing_type: BillingType::BilledAtOrder,
                billing_date: date(2024, 2, 25),
                billing_from: date(2024, 3, 1),
                billing_to: date(2024, 3, 31),
                billing_schedule_period_id: Some("period-3".into()),
                price: dec!(10000),
                final_price: dec!(10000),
                discount,
                tax: None,
                billing_ratio: None,
                adjustment_price: None,
                is_latest: true,
            },
        }
    }

    fn billed_discount() -> BilledDiscount {
        BilledDiscount {
            discount_id: "d-1".into(),
            discount_name: Some("sibling".to_string()),
            amount: DiscountAmount::Percentage(dec!(10)),
            discount_amount: dec!(1000),
            raw_discount_amount: dec!(1000),
        }
    }

    fn prices() -> Vec<ProductPrice> {
        [(ProductPriceType::Default, dec!(10000)), (ProductPriceType::Enrolled, dec!(8000))]
            .into_iter()
            .map(|(price_type, price)| ProductPrice {
                product_id: "product-1".into(),
                billing_schedule_period_id: Some("period-4".into()),
                price_type,
                price,
            })
            .collect()
    }

    /// A transaction positioned at the March period of a schedule ending in `last_month`.
    fn positioned_tx(last_month: i8, bill_items: Vec<BillItem>) -> MockBillingTx {
        let mut tx = MockBillingTx::new();

        tx.expect_student_product()
            .returning(|id| Ok(student_product(id.as_str(), date(2024, 1, 1), date(2024, 12, 31))));
        tx.expect_recurring_bill_items()
            .once()
            .withf(|order, product| order.as_str() == "order-1" && product.as_str() == "product-1")
            .return_once(move |_, _| Ok(bill_items));
        tx.expect_billing_schedule_period()
            .once()
            .returning(|id| Ok(period(id.as_str(), 3)));
        tx.expect_last_billing_schedule_period()
            .once()
            .returning(move |_| Ok(period(&format!("period-{last_month}"), last_month)));

        tx
    }

    fn store_with(transactions: Vec<MockBillingTx>) -> MockBillingStore {
        let mut store = MockBillingStore::new();
        let mut transactions = transactions.into_iter();

        store
            .expect_begin()
            .times(transactions.len())
            .returning(move |_| match transactions.next() {
                Some(tx) => Ok(Box::new(tx)),
                None => Err(sqlx::Error::PoolClosed),
            });

        store
    }

    fn due_tx(items: Vec<UpcomingBillItem>) -> MockBillingTx {
        let mut tx = MockBillingTx::new();

        tx.expect_due_upcoming_bill_items()
            .once()
            .withf(|today| *today == date(2024, 3, 25))
            .return_once(move |_| Ok(items));
        tx.expect_commit().once().returning(|| Ok(()));

        tx
    }

    fn expect_pricing(tx: &mut MockBillingTx, enrolled: bool) {
        tx.expect_next_billing_schedule_period()
            .once()
            .withf(|current| current.id.as_str() == "period-3")
            .returning(|_| Ok(period("period-4", 4)));
        tx.expect_tax().once().returning(|id| {
            Ok(Some(Tax {
                id: id.clone(),
                name: "consumption tax".to_string(),
                percentage: dec!(10),
                category: TaxCategory::Inclusive,
            }))
        });
        tx.expect_is_enrolled()
            .once()
            .withf(|student, at| student.as_str() == "student-1" && *at == Timestamp::UNIX_EPOCH)
            .returning(move |_, _| Ok(enrolled));
        tx.expect_product_prices()
            .once()
            .withf(|product, period| product.as_str() == "product-1" && period.as_str() == "period-4")
            .returning(|_, _| Ok(prices()));
    }

    #[tokio::test]
    async fn generates_the_next_period_with_the_carried_discount() -> TestResult {
        let mut tx = positioned_tx(12, vec![bill_item(7, Some(billed_discount()))]);

        expect_pricing(&mut tx, true);
        tx.expect_discount()
            .once()
            .withf(|id| id.as_str() == "d-1")
            .returning(|id| Ok(Some(discount(id.as_str(), DiscountAmount::Percentage(dec!(10))))));
        tx.expect_insert_bill_item()
            .once()
            .withf(|line| {
                line.billing_from == date(2024, 4, 1)
                    && line.billing_to == date(2024, 4, 30)
                    && line.price == dec!(8000)
                    && line.final_price == dec!(7200)
                    && line.billing_ratio.is_none()
                    && line.discount.as_ref().is_some_and(|d| d.discount_id.as_str() == "d-1")
                    && line.tax.as_ref().is_some_and(|t| t.tax_id.as_str() == "tax-1")
            })
            .returning(|_| Ok(8));
        tx.expect_insert_upcoming_bill_item()
            .once()
            .withf(|next| {
                next.billing_schedule_period_id.as_str() == "period-4"
                    && next.billing_date == date(2024, 3, 25)
                    && !next.is_generated
            })
            .returning(|_| Ok(()));
        tx.expect_mark_upcoming_bill_item_generated()
            .once()
            .withf(|item, note| item.billing_schedule_period_id.as_str() == "period-3" && note.is_none())
            .returning(|_, _| Ok(()));
        tx.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![due_tx(vec![upcoming()]), tx]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert!(outcome.successful);
        assert_eq!((outcome.succeeded, outcome.failed), (1, 0));

        Ok(())
    }

    #[tokio::test]
    async fn exhausted_discount_is_dropped() -> TestResult {
        let mut tx = positioned_tx(
            12,
            vec![
                bill_item(7, Some(billed_discount())),
                bill_item(6, Some(billed_discount())),
            ],
        );

        expect_pricing(&mut tx, false);
        tx.expect_discount().once().returning(|id| {
            let mut discount = discount(id.as_str(), DiscountAmount::Percentage(dec!(10)));
            discount.recurring_valid_duration = Some(2);

            Ok(Some(discount))
        });
        tx.expect_insert_bill_item()
            .once()
            .withf(|line| line.discount.is_none() && line.final_price == dec!(10000))
            .returning(|_| Ok(8));
        tx.expect_insert_upcoming_bill_item()
            .once()
            .withf(|next| next.discount_id.is_none())
            .returning(|_| Ok(()));
        tx.expect_mark_upcoming_bill_item_generated()
            .once()
            .returning(|_, _| Ok(()));
        tx.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![due_tx(vec![upcoming()]), tx]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert_eq!(outcome.succeeded, 1);

        Ok(())
    }

    #[tokio::test]
    async fn deleted_discount_generates_without_a_discount() -> TestResult {
        let mut tx = positioned_tx(12, vec![bill_item(7, Some(billed_discount()))]);

        expect_pricing(&mut tx, true);
        tx.expect_discount()
            .once()
            .withf(|id| id.as_str() == "d-1")
            .returning(|_| Ok(None));
        tx.expect_insert_bill_item()
            .once()
            .withf(|line| line.discount.is_none() && line.final_price == dec!(8000))
            .returning(|_| Ok(8));
        tx.expect_insert_upcoming_bill_item()
            .once()
            .withf(|next| next.discount_id.is_none())
            .returning(|_| Ok(()));
        tx.expect_mark_upcoming_bill_item_generated()
            .once()
            .withf(|_, note| note.is_none())
            .returning(|_, _| Ok(()));
        tx.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![due_tx(vec![upcoming()]), tx]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert_eq!((outcome.succeeded, outcome.failed), (1, 0));
        assert!(outcome.errors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn deleted_tax_generates_untaxed() -> TestResult {
        let mut tx = positioned_tx(12, vec![bill_item(7, None)]);

        tx.expect_next_billing_schedule_period()
            .once()
            .returning(|_| Ok(period("period-4", 4)));
        tx.expect_tax().once().returning(|_| Ok(None));
        tx.expect_is_enrolled().once().returning(|_, _| Ok(false));
        tx.expect_product_prices()
            .once()
            .returning(|_, _| Ok(prices()));
        tx.expect_insert_bill_item()
            .once()
            .withf(|line| line.tax.is_none() && line.final_price == dec!(10000))
            .returning(|_| Ok(8));
        tx.expect_insert_upcoming_bill_item()
            .once()
            .returning(|_| Ok(()));
        tx.expect_mark_upcoming_bill_item_generated()
            .once()
            .returning(|_, _| Ok(()));
        tx.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![due_tx(vec![upcoming()]), tx]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert_eq!((outcome.succeeded, outcome.failed), (1, 0));

        Ok(())
    }

    #[test]
    fn missing_rows_are_reported_as_not_found() {
        let product = StudentProductId::from("sp-1");

        let error = GenerationError::storage(&product, "load billing schedule period")(
            sqlx::Error::RowNotFound,
        );

        assert!(matches!(
            error,
            GenerationError::NotFound {
                operation: "load billing schedule period",
                ..
            }
        ));
        assert_eq!(
            error.to_string(),
            "nothing found to load billing schedule period for student product sp-1"
        );
    }

    #[tokio::test]
    async fn last_period_marks_the_upcoming_item_and_stops() -> TestResult {
        let mut tx = positioned_tx(3, vec![bill_item(7, None)]);

        tx.expect_next_billing_schedule_period().never();
        tx.expect_insert_bill_item().never();
        tx.expect_insert_upcoming_bill_item().never();
        tx.expect_mark_upcoming_bill_item_generated()
            .once()
            .withf(|_, note| *note == Some(LAST_BILL_ITEM_NOTE))
            .returning(|_, _| Ok(()));
        tx.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![due_tx(vec![upcoming()]), tx]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert_eq!((outcome.succeeded, outcome.failed), (1, 0));
        assert!(outcome.errors.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn superseded_product_is_marked_and_skipped() -> TestResult {
        let mut tx = MockBillingTx::new();

        tx.expect_student_product().once().returning(|id| {
            let mut product = student_product(id.as_str(), date(2024, 1, 1), date(2024, 12, 31));
            product.updated_to = Some("sp-2".into());

            Ok(product)
        });
        tx.expect_recurring_bill_items().never();
        tx.expect_insert_bill_item().never();
        tx.expect_mark_upcoming_bill_item_generated()
            .once()
            .withf(|item, note| {
                item.billing_schedule_period_id.as_str() == "period-3"
                    && *note == Some("STUDENT_PRODUCT_SUPERSEDED")
            })
            .returning(|_, _| Ok(()));
        tx.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![due_tx(vec![upcoming()]), tx]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert_eq!((outcome.succeeded, outcome.failed), (1, 0));

        Ok(())
    }

    #[tokio::test]
    async fn missing_bill_items_are_noted_and_the_batch_continues() -> TestResult {
        let mut failing = MockBillingTx::new();
        failing
            .expect_student_product()
            .returning(|id| Ok(student_product(id.as_str(), date(2024, 1, 1), date(2024, 12, 31))));
        failing
            .expect_recurring_bill_items()
            .once()
            .returning(|_, _| Ok(Vec::new()));
        failing.expect_commit().never();

        let mut noting = MockBillingTx::new();
        noting
            .expect_note_upcoming_bill_item()
            .once()
            .withf(|_, note| {
                note == "bill item not found with order_id order-1 and product_id product-1"
            })
            .returning(|_, _| Ok(()));
        noting.expect_commit().once().returning(|| Ok(()));

        let mut cancelled = MockBillingTx::new();
        cancelled.expect_student_product().once().returning(|id| {
            let mut product = student_product(id.as_str(), date(2024, 1, 1), date(2024, 12, 31));
            product.status = StudentProductStatus::Cancelled;

            Ok(product)
        });
        cancelled
            .expect_mark_upcoming_bill_item_generated()
            .once()
            .withf(|_, note| *note == Some("STUDENT_PRODUCT_CANCELLED"))
            .returning(|_, _| Ok(()));
        cancelled.expect_commit().once().returning(|| Ok(()));

        let store = store_with(vec![
            due_tx(vec![upcoming(), upcoming()]),
            failing,
            noting,
            cancelled,
        ]);

        let outcome = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await?;

        assert!(outcome.successful);
        assert_eq!((outcome.succeeded, outcome.failed), (1, 1));
        assert_eq!(
            outcome.errors,
            vec!["bill item not found with order_id order-1 and product_id product-1".to_string()]
        );

        Ok(())
    }

    #[tokio::test]
    async fn unreadable_upcoming_items_fail_the_job() {
        let mut tx = MockBillingTx::new();
        tx.expect_due_upcoming_bill_items()
            .returning(|_| Err(sqlx::Error::PoolTimedOut));

        let store = store_with(vec![tx]);

        let result = RecurringBillItemGenerator::new(Arc::new(store))
            .generate(&org(), as_of())
            .await;

        assert!(matches!(result, Err(BillingError::UpcomingBillItems(_))));
    }
}
