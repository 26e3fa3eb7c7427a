//! Billing status updater.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::{Span, debug, info, warn};

use crate::{
    batch::{AsOf, BatchOutcome, report},
    context::OrgContext,
    domain::billing::{
        errors::{BillingError, BillingStatusError},
        ports::BillingStore,
    },
};

#[automock]
#[async_trait]
pub trait BillingStatusService: Send + Sync {
    /// Move pending bill items whose billing date has arrived to billed.
    async fn bill_due_items(&self, ctx: &OrgContext, as_of: AsOf)
    -> Result<BatchOutcome, BillingError>;
}

pub struct BillingStatusUpdater {
    store: Arc<dyn BillingStore>,
}

impl BillingStatusUpdater {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    async fn bill(&self, ctx: &OrgContext, sequence_number: i64) -> Result<u64, BillingStatusError> {
        let storage = |operation| BillingStatusError::storage(sequence_number, operation);

        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(storage("begin transaction"))?;

        let updated = tx
            .mark_bill_item_billed(sequence_number)
            .await
            .map_err(storage("mark bill item billed"))?;

        tx.commit().await.map_err(storage("commit billing status"))?;

        Ok(updated)
    }
}

impl std::fmt::Debug for BillingStatusUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingStatusUpdater").finish_non_exhaustive()
    }
}

#[async_trait]
impl BillingStatusService for BillingStatusUpdater {
    #[tracing::instrument(
        name = "billing.status.bill_due_items",
        skip(self, ctx),
        fields(organization = %ctx.organization, today = %as_of.today, due = tracing::field::Empty),
        err
    )]
    async fn bill_due_items(
        &self,
        ctx: &OrgContext,
        as_of: AsOf,
    ) -> Result<BatchOutcome, BillingError> {
        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(BillingError::PendingBillItems)?;

        let due = tx
            .due_pending_bill_items(as_of.today)
            .await
            .map_err(BillingError::PendingBillItems)?;

        tx.commit().await.map_err(BillingError::PendingBillItems)?;

        Span::current().record("due", due.len());

        let mut outcome = BatchOutcome::new();

        for sequence_number in due {
            match self.bill(ctx, sequence_number).await {
                Ok(updated) => {
                    // 0 rows: billed concurrently, nothing left to do
                    debug!(sequence_number, updated, "billed bill item");

                    outcome.record_success();
                }
                Err(error) => {
                    warn!(sequence_number, error = %report(&error), "failed to bill bill item");

                    outcome.record_failure(&error);
                }
            }
        }

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "updated billing status"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, civil::date};
    use testresult::TestResult;

    use super::*;
    use crate::{
        domain::billing::ports::{MockBillingStore, MockBillingTx},
        test::fixtures::org,
    };

    #[tokio::test]
    async fn bills_each_due_item_in_its_own_transaction() -> TestResult {
        let mut store = MockBillingStore::new();
        let mut calls = 0;

        store.expect_begin().times(4).returning(move |_| {
            calls += 1;

            let mut tx = MockBillingTx::new();

            match calls {
                1 => {
                    tx.expect_due_pending_bill_items()
                        .once()
                        .withf(|today| *today == date(2024, 3, 25))
                        .returning(|_| Ok(vec![11, 12, 13]));
                    tx.expect_commit().once().returning(|| Ok(()));
                }
                3 => {
                    tx.expect_mark_bill_item_billed()
                        .once()
                        .withf(|sequence_number| *sequence_number == 12)
                        .returning(|_| Err(sqlx::Error::PoolTimedOut));
                    tx.expect_commit().never();
                }
                _ => {
                    tx.expect_mark_bill_item_billed().once().returning(|_| Ok(1));
                    tx.expect_commit().once().returning(|| Ok(()));
                }
            }

            Ok(Box::new(tx))
        });

        let outcome = BillingStatusUpdater::new(Arc::new(store))
            .bill_due_items(&org(), AsOf::new(Timestamp::UNIX_EPOCH, date(2024, 3, 25)))
            .await?;

        assert!(outcome.successful);
        assert_eq!((outcome.succeeded, outcome.failed), (2, 1));
        assert!(outcome.errors[0].starts_with("failed to mark bill item billed for bill item 12"));

        Ok(())
    }
}
