//! Outbox
//!
//! Events leave the billing service through the `outbox_events` table. They
//! are written in the same transaction as the change that caused them and an
//! external relay publishes them, so an event exists if and only if its change
//! was committed.

use serde::Serialize;

pub mod notification;
mod repository;

pub(crate) use repository::PgOutboxRepository;

/// Subject an outbox event is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// A student product's discount changed.
    UpdateStudentProduct,

    /// Staff must act on a blocked automatic change.
    Notification,

    /// An update order must be created for a student product.
    UpdateOrderRequested,
}

impl Topic {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdateStudentProduct => "UpdateStudentProduct.Created",
            Self::Notification => "Notification.Created",
            Self::UpdateOrderRequested => "Order.UpdateRequested",
        }
    }
}

/// An event waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    pub topic: Topic,

    /// Partition key; events with the same key are published in order.
    pub key: String,

    pub payload: serde_json::Value,
}

impl OutboxEvent {
    /// Serialize `payload` for `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn encode<T: Serialize>(
        topic: Topic,
        key: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic,
            key: key.into(),
            payload: serde_json::to_value(payload)?,
        })
    }
}
