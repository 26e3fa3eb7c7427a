//! Discount service models.

use bursar::{
    ids::{LocationId, OrderId, StudentId, StudentProductId},
    lifecycle::{OrderStatus, OrderType},
};
use serde::{Deserialize, Serialize};

/// An order with the student products it touched, as logged by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub student_id: StudentId,
    pub location_id: LocationId,
    pub order_id: OrderId,
    pub order_type: OrderType,
    pub order_status: OrderStatus,

    #[serde(default)]
    pub student_product_ids: Vec<StudentProductId>,
}

/// What the tracker changed for one order event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackingOutcome {
    /// Tracker rows created.
    pub tracked: usize,

    /// Tracker rows whose duration was revised.
    pub revised: u64,

    /// Tracker rows of cancelled student products deleted by a void.
    pub expired: u64,
}

impl TrackingOutcome {
    /// Whether any tracker row changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.tracked > 0 || self.revised > 0 || self.expired > 0
    }
}
