use bursar::ids::OrganizationId;
use bursar_app::{
    batch::report,
    context::AppContext,
    jobs::{self, Job},
};
use clap::{Args, Subcommand};

use crate::cli::print_json;

#[derive(Debug, Args)]
pub(crate) struct JobsCommand {
    #[command(subcommand)]
    command: JobsSubcommand,
}

#[derive(Debug, Subcommand)]
enum JobsSubcommand {
    /// Generate the next bill item of every due recurring product
    GenerateBillingItems(JobArgs),

    /// Bill pending bill items whose billing date has arrived
    UpdateBillingStatus(JobArgs),

    /// Apply the highest available discount to every live student product
    AutoSelectHighestDiscount(JobArgs),
}

#[derive(Debug, Args)]
struct JobArgs {
    /// Organization to run the job for
    #[arg(long)]
    organization: String,
}

pub(crate) async fn run(app: &AppContext, command: JobsCommand) -> Result<(), String> {
    let (job, args) = match command.command {
        JobsSubcommand::GenerateBillingItems(args) => (Job::GenerateBillingItems, args),
        JobsSubcommand::UpdateBillingStatus(args) => (Job::UpdateBillingStatus, args),
        JobsSubcommand::AutoSelectHighestDiscount(args) => (Job::AutoSelectHighestDiscount, args),
    };

    let outcome = jobs::run(app, job, &OrganizationId::new(args.organization))
        .await
        .map_err(|error| format!("{} failed: {}", job.name(), report(&error)))?;

    print_json(&outcome)
}
