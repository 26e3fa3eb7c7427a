//! Bursar Domain Concerns

pub mod billing;
pub mod discounts;
pub(crate) mod students;
