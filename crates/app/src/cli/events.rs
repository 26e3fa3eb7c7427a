use std::path::PathBuf;

use bursar::ids::OrganizationId;
use bursar_app::{batch::report, context::AppContext};
use clap::{Args, Subcommand};

use crate::cli::print_json;

#[derive(Debug, Args)]
pub(crate) struct EventsCommand {
    #[command(subcommand)]
    command: EventsSubcommand,
}

#[derive(Debug, Subcommand)]
enum EventsSubcommand {
    /// Track the student products of a logged order
    OrderLog(EventArgs),

    /// Request the update order for a discount change
    UpdateProductDiscount(EventArgs),
}

#[derive(Debug, Args)]
struct EventArgs {
    /// Organization the event was published for
    #[arg(long)]
    organization: String,

    /// File holding the JSON payload
    #[arg(long)]
    payload: PathBuf,
}

pub(crate) async fn run(app: &AppContext, command: EventsCommand) -> Result<(), String> {
    match command.command {
        EventsSubcommand::OrderLog(args) => {
            let (organization, payload) = read(&args).await?;

            let outcome = app
                .order_log
                .handle(&organization, &payload)
                .await
                .map_err(|error| format!("order log failed: {}", report(&error)))?;

            print_json(&outcome)
        }
        EventsSubcommand::UpdateProductDiscount(args) => {
            let (organization, payload) = read(&args).await?;

            let draft = app
                .product_discounts
                .handle(&organization, &payload)
                .await
                .map_err(|error| format!("update product discount failed: {}", report(&error)))?;

            print_json(&draft)
        }
    }
}

async fn read(args: &EventArgs) -> Result<(OrganizationId, Vec<u8>), String> {
    let payload = tokio::fs::read(&args.payload).await.map_err(|error| {
        format!("failed to read payload {}: {error}", args.payload.display())
    })?;

    Ok((OrganizationId::new(args.organization.as_str()), payload))
}
