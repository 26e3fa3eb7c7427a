//! Batch Jobs
//!
//! Entry points for the scheduled jobs. A job validates its request, resolves
//! the organization's service user and billing day, then hands over to the
//! service that walks the candidates. Only an invalid request fails a job;
//! per-candidate failures are reported in the returned [`BatchOutcome`].

use bursar::ids::OrganizationId;
use jiff::Timestamp;
use thiserror::Error;
use tracing::info;

use crate::{
    batch::{AsOf, BatchOutcome},
    context::{AppContext, OrgContext},
    domain::{billing::BillingError, discounts::DiscountSelectionError},
};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Selection(#[from] DiscountSelectionError),
}

/// A scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    GenerateBillingItems,
    UpdateBillingStatus,
    AutoSelectHighestDiscount,
}

impl Job {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GenerateBillingItems => "generate-billing-items",
            Self::UpdateBillingStatus => "update-billing-status",
            Self::AutoSelectHighestDiscount => "auto-select-highest-discount",
        }
    }
}

/// Run `job` for `organization` at the current time.
///
/// # Errors
///
/// Returns [`JobError::InvalidRequest`] for a blank or unconfigured
/// organization, or the service error when the job cannot list its
/// candidates.
pub async fn run(
    app: &AppContext,
    job: Job,
    organization: &OrganizationId,
) -> Result<BatchOutcome, JobError> {
    run_at(app, job, organization, Timestamp::now()).await
}

#[tracing::instrument(name = "jobs.run", skip(app, job), fields(job = job.name()), err)]
pub(crate) async fn run_at(
    app: &AppContext,
    job: Job,
    organization: &OrganizationId,
    now: Timestamp,
) -> Result<BatchOutcome, JobError> {
    let ctx = context(app, organization)?;
    let as_of = AsOf::in_zone(now, &app.time_zone);

    let outcome = match job {
        Job::GenerateBillingItems => app.generator.generate(&ctx, as_of).await?,
        Job::UpdateBillingStatus => app.billing_status.bill_due_items(&ctx, as_of).await?,
        Job::AutoSelectHighestDiscount => app.selector.auto_select(&ctx, as_of).await?,
    };

    info!(
        job = job.name(),
        today = %as_of.today,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "finished job"
    );

    Ok(outcome)
}

fn context(app: &AppContext, organization: &OrganizationId) -> Result<OrgContext, JobError> {
    if organization.is_empty() {
        return Err(JobError::InvalidRequest("organization is required".to_string()));
    }

    app.service_users.context(organization).ok_or_else(|| {
        JobError::InvalidRequest(format!(
            "no service user configured for organization {organization}"
        ))
    })
}
