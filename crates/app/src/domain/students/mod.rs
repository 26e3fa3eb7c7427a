//! Students
//!
//! Student products, sibling relations and enrollment history, read by both
//! the discount and the billing concerns.

mod repository;

pub(crate) use repository::PgStudentsRepository;
