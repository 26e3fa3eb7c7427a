//! Event handling errors.

use bursar::ids::OrganizationId;
use thiserror::Error;

use crate::domain::{billing::DiscountDraftError, discounts::TrackerError};

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to decode event payload")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("event is missing a student id")]
    MissingStudentId,

    #[error("no service user configured for organization {0}")]
    UnknownOrganization(OrganizationId),

    #[error("failed to track order discounts")]
    Tracking(#[from] TrackerError),

    #[error("failed to draft update order")]
    Draft(#[from] DiscountDraftError),

    #[error("failed to request update order")]
    Order(#[from] OrderGatewayError),
}

impl EventError {
    /// Whether redelivering the same message can never succeed.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_) | Self::MissingStudentId | Self::UnknownOrganization(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum OrderGatewayError {
    #[error("failed to encode update order request")]
    Encode(#[from] serde_json::Error),

    #[error("failed to store update order request")]
    Sql(#[from] sqlx::Error),
}
