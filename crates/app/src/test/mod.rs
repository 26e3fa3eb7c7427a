//! Shared fixtures and the Postgres harness for service tests.

mod context;
mod db;

pub(crate) use context::TestContext;
