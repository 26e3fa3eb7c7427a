//! Runtime configuration

use clap::Args;

use crate::config::{db::DatabaseConfig, logging::LoggingConfig, organizations::OrganizationsConfig};

pub mod db;
pub mod logging;
pub mod organizations;

/// Settings shared by every command.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Per-organization settings.
    #[command(flatten)]
    pub organizations: OrganizationsConfig,
}
