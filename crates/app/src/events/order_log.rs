//! Order-with-product-info log handler.

use std::sync::Arc;

use bursar::ids::OrganizationId;
use tracing::info;

use crate::{
    config::organizations::OrgServiceUsers,
    domain::discounts::{DiscountTrackerService, OrderEvent, TrackingOutcome},
    events::errors::EventError,
};

/// Feeds logged orders to the discount tracker.
#[derive(Clone)]
pub struct OrderLogHandler {
    tracker: Arc<dyn DiscountTrackerService>,
    users: OrgServiceUsers,
}

impl OrderLogHandler {
    #[must_use]
    pub fn new(tracker: Arc<dyn DiscountTrackerService>, users: OrgServiceUsers) -> Self {
        Self { tracker, users }
    }

    /// Track the student products of one logged order.
    ///
    /// # Errors
    ///
    /// Returns an error for a payload that cannot be handled, or when
    /// tracking fails and the message should be redelivered.
    #[tracing::instrument(
        name = "events.order_log.handle",
        skip(self, payload),
        fields(organization = %organization),
        err
    )]
    pub async fn handle(
        &self,
        organization: &OrganizationId,
        payload: &[u8],
    ) -> Result<TrackingOutcome, EventError> {
        let event: OrderEvent =
            serde_json::from_slice(payload).map_err(EventError::InvalidPayload)?;

        if event.student_id.is_empty() {
            return Err(EventError::MissingStudentId);
        }

        let ctx = self
            .users
            .context(organization)
            .ok_or_else(|| EventError::UnknownOrganization(organization.clone()))?;

        let outcome = self.tracker.handle_order(&ctx, &event).await?;

        info!(
            order_id = %event.order_id,
            order_type = %event.order_type,
            tracked = outcome.tracked,
            revised = outcome.revised,
            expired = outcome.expired,
            "handled order log"
        );

        Ok(outcome)
    }
}

impl std::fmt::Debug for OrderLogHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLogHandler")
            .field("users", &self.users)
            .finish_non_exhaustive()
    }
}
