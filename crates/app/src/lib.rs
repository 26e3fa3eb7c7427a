//! Bursar application: persistence, services, jobs and event handlers.

pub mod batch;
pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod events;
pub mod jobs;
pub mod observability;
pub mod outbox;

#[cfg(test)]
mod test;
