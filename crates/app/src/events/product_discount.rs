//! Update-student-product-discount handler.

use std::sync::Arc;

use bursar::{billing::DiscountDraft, discounts::UpdateProductDiscount, ids::OrganizationId};
use jiff::{Timestamp, tz::TimeZone};
use tracing::info;

use crate::{
    batch::AsOf,
    config::organizations::OrgServiceUsers,
    domain::billing::DiscountDraftService,
    events::{
        errors::EventError,
        orders::{OrderGateway, UpdateOrderRequest},
    },
};

/// Turns published discount changes into update order requests.
#[derive(Clone)]
pub struct UpdateProductDiscountHandler {
    drafts: Arc<dyn DiscountDraftService>,
    orders: Arc<dyn OrderGateway>,
    users: OrgServiceUsers,
    time_zone: TimeZone,
}

impl UpdateProductDiscountHandler {
    #[must_use]
    pub fn new(
        drafts: Arc<dyn DiscountDraftService>,
        orders: Arc<dyn OrderGateway>,
        users: OrgServiceUsers,
        time_zone: TimeZone,
    ) -> Self {
        Self {
            drafts,
            orders,
            users,
            time_zone,
        }
    }

    /// Draft and request the update order for one discount change.
    ///
    /// # Errors
    ///
    /// Returns an error for a payload that cannot be handled, when no billed
    /// period is touched, or when the order request cannot be stored.
    pub async fn handle(
        &self,
        organization: &OrganizationId,
        payload: &[u8],
    ) -> Result<DiscountDraft, EventError> {
        self.handle_at(organization, payload, Timestamp::now()).await
    }

    #[tracing::instrument(
        name = "events.product_discount.handle",
        skip(self, payload),
        fields(organization = %organization),
        err
    )]
    pub(crate) async fn handle_at(
        &self,
        organization: &OrganizationId,
        payload: &[u8],
        now: Timestamp,
    ) -> Result<DiscountDraft, EventError> {
        let update: UpdateProductDiscount =
            serde_json::from_slice(payload).map_err(EventError::InvalidPayload)?;

        if update.student_id.is_empty() {
            return Err(EventError::MissingStudentId);
        }

        let ctx = self
            .users
            .context(organization)
            .ok_or_else(|| EventError::UnknownOrganization(organization.clone()))?;

        let draft = self
            .drafts
            .draft(&ctx, &update, AsOf::in_zone(now, &self.time_zone))
            .await?;

        let request = UpdateOrderRequest { update, draft };

        self.orders.create_update_order(&ctx, &request).await?;

        info!(
            student_product_id = %request.update.student_product_id,
            bill_items = request.draft.bill_items.len(),
            upcoming_bill_items = request.draft.upcoming_bill_items.len(),
            "requested update order"
        );

        Ok(request.draft)
    }
}

impl std::fmt::Debug for UpdateProductDiscountHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateProductDiscountHandler")
            .field("users", &self.users)
            .field("time_zone", &self.time_zone)
            .finish_non_exhaustive()
    }
}
