//! Update order drafts for discount changes.

use std::sync::Arc;

use async_trait::async_trait;
use bursar::{
    billing::{
        DiscountDraft, PeriodRepricing, affected_periods, draft_discount_update, needs_proration,
        price_for,
    },
    discounts::UpdateProductDiscount,
};
use mockall::automock;
use tracing::{Span, debug};

use crate::{
    batch::AsOf,
    context::OrgContext,
    domain::billing::{errors::DiscountDraftError, ports::BillingStore},
};

#[automock]
#[async_trait]
pub trait DiscountDraftService: Send + Sync {
    /// Re-price every billed period a discount change touches.
    async fn draft(
        &self,
        ctx: &OrgContext,
        update: &UpdateProductDiscount,
        as_of: AsOf,
    ) -> Result<DiscountDraft, DiscountDraftError>;
}

pub struct UpdateOrderDrafter {
    store: Arc<dyn BillingStore>,
}

impl UpdateOrderDrafter {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for UpdateOrderDrafter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrderDrafter").finish_non_exhaustive()
    }
}

#[async_trait]
impl DiscountDraftService for UpdateOrderDrafter {
    #[tracing::instrument(
        name = "billing.drafts.draft",
        skip(self, ctx, update, as_of),
        fields(
            student_product_id = %update.student_product_id,
            effective_date = %update.effective_date,
            bill_items = tracing::field::Empty,
            upcoming_bill_items = tracing::field::Empty,
        ),
        err
    )]
    async fn draft(
        &self,
        ctx: &OrgContext,
        update: &UpdateProductDiscount,
        as_of: AsOf,
    ) -> Result<DiscountDraft, DiscountDraftError> {
        let storage =
            |operation| DiscountDraftError::storage(&update.student_product_id, operation);

        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(storage("begin transaction"))?;

        let product = tx
            .billable_product(&update.product_id)
            .await
            .map_err(storage("load product"))?;

        let Some(schedule) = product.billing_schedule_id.as_ref() else {
            return Err(DiscountDraftError::NotRecurring(product.id));
        };

        let student_product = tx
            .student_product(&update.student_product_id)
            .await
            .map_err(storage("load student product"))?;

        let created_at = if student_product.root() == &student_product.id {
            student_product.created_at
        } else {
            tx.student_product(student_product.root())
                .await
                .map_err(storage("load root student product"))?
                .created_at
        };

        let enrolled = tx
            .is_enrolled(&update.student_id, created_at)
            .await
            .map_err(storage("check enrollment"))?;

        let periods = tx
            .billing_schedule_periods(schedule)
            .await
            .map_err(storage("load billing schedule periods"))?;

        let mut repricings = Vec::new();

        for period in affected_periods(update, &periods) {
            let Some(previous) = tx
                .latest_bill_item_for_period(&update.student_product_id, &period.id)
                .await
                .map_err(storage("load latest bill item"))?
            else {
                debug!(period_id = %period.id, "period not billed yet");

                continue;
            };

            let prices = tx
                .product_prices(&update.product_id, &period.id)
                .await
                .map_err(storage("load product prices"))?;

            let price = price_for(&prices, enrolled)
                .map(|price| price.price)
                .ok_or_else(|| DiscountDraftError::PriceNotFound {
                    product: update.product_id.clone(),
                    period: period.id.clone(),
                })?;

            let ratio = if needs_proration(&product, period, update.effective_date) {
                tx.billing_ratio(&period.id, update.effective_date)
                    .await
                    .map_err(storage("load billing ratio"))?
            } else {
                None
            };

            let tax = match previous.line.tax.as_ref() {
                Some(billed) => tx
                    .tax(&billed.tax_id)
                    .await
                    .map_err(storage("load tax"))?,
                None => None,
            };

            repricings.push(PeriodRepricing {
                period: period.clone(),
                previous,
                price,
                ratio,
                tax,
            });
        }

        tx.commit().await.map_err(storage("commit draft"))?;

        let draft = draft_discount_update(update, &repricings, as_of.today)?;

        let span = Span::current();
        span.record("bill_items", draft.bill_items.len());
        span.record("upcoming_bill_items", draft.upcoming_bill_items.len());

        Ok(draft)
    }
}
