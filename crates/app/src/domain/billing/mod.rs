//! Billing
//!
//! Recurring bill item generation, the pending-to-billed status job and the
//! drafting of update orders for discount changes. Every item is processed in
//! its own transaction; one failing item never stops a batch.

pub mod drafts;
pub mod errors;
pub mod generator;
pub mod ports;
pub(crate) mod repositories;
pub mod status;
mod store;

pub use drafts::*;
pub use errors::*;
pub use generator::*;
pub use ports::*;
pub use status::*;
