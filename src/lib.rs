//! Bursar
//!
//! Bursar is the discount-eligibility and recurring-billing engine of an
//! education billing platform. It decides in which windows a student
//! qualifies for a sibling discount, picks the single highest discount for a
//! student product and prices the next bill item of a recurring product.
//!
//! The crate performs no I/O; persistence and scheduling live in `bursar-app`.

pub mod billing;
pub mod discounts;
pub mod ids;
pub mod lifecycle;
pub mod prelude;
pub mod pricing;
pub mod segments;
pub mod students;
pub mod tags;
pub mod tracking;
