//! Discounts
//!
//! Sibling and combo discount tracking driven by order events, the user
//! discount tags derived from it, and the scheduled selection of the highest
//! discount for every live student product.

pub mod errors;
pub mod models;
pub mod ports;
pub mod reconciler;
pub(crate) mod repositories;
pub mod selector;
mod store;
pub mod tracker;

pub use errors::*;
pub use models::*;
pub use ports::*;
pub use reconciler::*;
pub use selector::*;
pub use tracker::*;
