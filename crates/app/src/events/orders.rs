//! Update order requests.
//!
//! Creating the order itself belongs to the order service; billing only
//! hands it the drafted bill items.

use async_trait::async_trait;
use bursar::{billing::DiscountDraft, discounts::UpdateProductDiscount};
use mockall::automock;
use serde::Serialize;

use crate::{
    context::OrgContext,
    database::Db,
    events::errors::OrderGatewayError,
    outbox::{OutboxEvent, PgOutboxRepository, Topic},
};

/// A discount change and the bill items of the order that applies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOrderRequest {
    pub update: UpdateProductDiscount,
    pub draft: DiscountDraft,
}

#[automock]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_update_order(
        &self,
        ctx: &OrgContext,
        request: &UpdateOrderRequest,
    ) -> Result<(), OrderGatewayError>;
}

/// Requests update orders through the outbox.
#[derive(Debug, Clone)]
pub struct OutboxOrderGateway {
    db: Db,
}

impl OutboxOrderGateway {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderGateway for OutboxOrderGateway {
    #[tracing::instrument(
        name = "events.orders.create_update_order",
        skip(self, ctx, request),
        fields(student_product_id = %request.update.student_product_id),
        err
    )]
    async fn create_update_order(
        &self,
        ctx: &OrgContext,
        request: &UpdateOrderRequest,
    ) -> Result<(), OrderGatewayError> {
        let event = OutboxEvent::encode(
            Topic::UpdateOrderRequested,
            request.update.student_product_id.as_str(),
            request,
        )?;

        let mut tx = self.db.begin_org_transaction(ctx).await?;

        PgOutboxRepository.insert_event(&mut tx, &event).await?;

        tx.commit().await?;

        Ok(())
    }
}
