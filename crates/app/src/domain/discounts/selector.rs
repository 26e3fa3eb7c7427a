//! Highest discount selector.

use std::sync::Arc;

use async_trait::async_trait;
use bursar::{
    discounts::{Discount, DiscountDecision, decide, select_highest},
    students::StudentProduct,
};
use mockall::automock;
use tracing::{Span, debug, info, warn};

use crate::{
    batch::{AsOf, BatchOutcome, report},
    context::OrgContext,
    domain::discounts::{errors::DiscountSelectionError, ports::SelectionStore},
    outbox::{OutboxEvent, Topic, notification::ScheduledChangeNotification},
};

/// What happened to one student product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Unchanged,
    Applied,
    Deferred,
}

#[automock]
#[async_trait]
pub trait HighestDiscountService: Send + Sync {
    /// Re-evaluate the discount of every ordered recurring student product
    /// and publish a change wherever the highest discount differs from the
    /// billed one.
    async fn auto_select(
        &self,
        ctx: &OrgContext,
        as_of: AsOf,
    ) -> Result<BatchOutcome, DiscountSelectionError>;
}

pub struct HighestDiscountSelector {
    store: Arc<dyn SelectionStore>,
}

impl HighestDiscountSelector {
    #[must_use]
    pub fn new(store: Arc<dyn SelectionStore>) -> Self {
        Self { store }
    }

    async fn candidates(
        &self,
        ctx: &OrgContext,
        as_of: AsOf,
    ) -> Result<Vec<StudentProduct>, DiscountSelectionError> {
        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(DiscountSelectionError::Candidates)?;

        let candidates = tx
            .selection_candidates(as_of.today)
            .await
            .map_err(DiscountSelectionError::Candidates)?;

        tx.commit()
            .await
            .map_err(DiscountSelectionError::Candidates)?;

        Ok(candidates)
    }

    /// Percentage discounts granted by the student's discount tags.
    ///
    /// Runs in its own transaction: a failed lookup leaves the product-level
    /// fallback usable.
    async fn tag_based(
        &self,
        ctx: &OrgContext,
        product: &StudentProduct,
        as_of: AsOf,
    ) -> Result<Vec<Discount>, DiscountSelectionError> {
        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(DiscountSelectionError::storage(&product.id, "begin transaction"))?;

        let tags = tx
            .eligible_discount_tag_ids(product, as_of.today)
            .await
            .map_err(DiscountSelectionError::storage(&product.id, "load discount tags"))?;

        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let discounts = tx
            .tag_discounts(&tags, as_of.now)
            .await
            .map_err(DiscountSelectionError::storage(&product.id, "load tag discounts"))?;

        tx.commit()
            .await
            .map_err(DiscountSelectionError::storage(&product.id, "commit tag discounts"))?;

        Ok(discounts)
    }

    async fn select_for(
        &self,
        ctx: &OrgContext,
        product: &StudentProduct,
        as_of: AsOf,
    ) -> Result<Selection, DiscountSelectionError> {
        let tag_based = match self.tag_based(ctx, product, as_of).await {
            Ok(discounts) => discounts,
            Err(error) => {
                warn!(
                    student_product_id = %product.id,
                    error = %report(&error),
                    "tag discounts unavailable, falling back to product discounts"
                );

                Vec::new()
            }
        };

        let storage = |operation| DiscountSelectionError::storage(&product.id, operation);

        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(storage("begin transaction"))?;

        let product_level = tx
            .product_discounts(&product.product_id, as_of.now)
            .await
            .map_err(storage("load product discounts"))?;

        let billed = tx
            .billed_discount(&product.id)
            .await
            .map_err(storage("load billed discount"))?;

        let selected = select_highest(&tag_based, &product_level);

        let (event, selection) = match decide(product, selected, billed.as_ref(), as_of.today) {
            DiscountDecision::Unchanged => return Ok(Selection::Unchanged),
            DiscountDecision::Apply(update) => {
                let event = OutboxEvent::encode(
                    Topic::UpdateStudentProduct,
                    update.student_product_id.as_str(),
                    &update,
                );

                (event, Selection::Applied)
            }
            DiscountDecision::Defer { label, update } => {
                let recipients = tx
                    .notification_recipients(&product.location_id)
                    .await
                    .map_err(storage("load notification recipients"))?;

                let event = ScheduledChangeNotification::new(&update, label, recipients).to_event();

                (event, Selection::Deferred)
            }
        };

        let event = event.map_err(|source| DiscountSelectionError::Encode {
            student_product: product.id.clone(),
            source,
        })?;

        tx.enqueue(&event)
            .await
            .map_err(storage("enqueue discount event"))?;

        tx.commit().await.map_err(storage("commit discount event"))?;

        Ok(selection)
    }
}

impl std::fmt::Debug for HighestDiscountSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighestDiscountSelector").finish_non_exhaustive()
    }
}

#[async_trait]
impl HighestDiscountService for HighestDiscountSelector {
    #[tracing::instrument(
        name = "discounts.selector.auto_select",
        skip(self, ctx),
        fields(
            organization = %ctx.organization,
            today = %as_of.today,
            candidates = tracing::field::Empty,
            applied = tracing::field::Empty,
            deferred = tracing::field::Empty,
        ),
        err
    )]
    async fn auto_select(
        &self,
        ctx: &OrgContext,
        as_of: AsOf,
    ) -> Result<BatchOutcome, DiscountSelectionError> {
        let candidates = self.candidates(ctx, as_of).await?;

        let mut outcome = BatchOutcome::new();
        let (mut applied, mut deferred) = (0_usize, 0_usize);

        for product in &candidates {
            match self.select_for(ctx, product, as_of).await {
                Ok(selection) => {
                    match selection {
                        Selection::Applied => applied += 1,
                        Selection::Deferred => deferred += 1,
                        Selection::Unchanged => {}
                    }

                    debug!(student_product_id = %product.id, ?selection, "selected highest discount");

                    outcome.record_success();
                }
                Err(error) => {
                    warn!(
                        student_product_id = %product.id,
                        student_id = %product.student_id,
                        error = %report(&error),
                        "failed to select highest discount"
                    );

                    outcome.record_failure(&error);
                }
            }
        }

        let span = Span::current();
        span.record("candidates", candidates.len());
        span.record("applied", applied);
        span.record("deferred", deferred);

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            applied,
            deferred,
            "selected highest discounts"
        );

        Ok(outcome)
    }
}
