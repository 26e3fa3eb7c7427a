use bursar_app::{
    batch::report, config::AppConfig, context::AppContext, observability::init_subscriber,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

mod events;
mod jobs;

#[derive(Debug, Parser)]
#[command(name = "bursar", about = "Bursar billing CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a scheduled job once
    Jobs(jobs::JobsCommand),

    /// Replay an inbound event from a file
    Events(events::EventsCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        init_subscriber(&self.config.logging).map_err(|error| error.to_string())?;

        let app = connect(&self.config).await?;

        match self.command {
            Commands::Jobs(command) => jobs::run(&app, command).await,
            Commands::Events(command) => events::run(&app, command).await,
        }
    }
}

async fn connect(config: &AppConfig) -> Result<AppContext, String> {
    let time_zone = config
        .organizations
        .time_zone()
        .map_err(|error| format!("invalid billing time zone: {error}"))?;

    AppContext::from_database_url(
        &config.database.database_url,
        config.organizations.service_users.clone(),
        time_zone,
    )
    .await
    .map_err(|error| format!("failed to initialise application: {}", report(&error)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to encode output: {error}"))?;

    println!("{json}");

    Ok(())
}
