//! Inbound Events
//!
//! Handlers for the messages the billing service subscribes to. Each handler
//! takes the raw JSON payload and the organization it was published for,
//! acts as that organization's service user, and returns an error when the
//! message should be redelivered.

pub mod errors;
pub mod order_log;
pub mod orders;
pub mod product_discount;

pub use errors::*;
pub use order_log::*;
pub use orders::*;
pub use product_discount::*;
