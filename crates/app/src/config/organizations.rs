//! Organization Config
//!
//! Batch jobs and event handlers act on behalf of a per-organization service
//! user so row-level security applies to everything they touch. The mapping is
//! read once at startup from `ORG_SERVICE_USERS` as `org=user` pairs separated
//! by commas.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use bursar::ids::{OrganizationId, UserId};
use clap::Args;
use jiff::tz::TimeZone;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::context::OrgContext;

/// Errors raised while parsing the organization to service user mapping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrgServiceUsersError {
    #[error("expected `organization=user`, got `{0}`")]
    Malformed(String),

    #[error("organization `{0}` is mapped more than once")]
    Duplicate(String),
}

/// Service user each organization's background work impersonates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgServiceUsers {
    users: FxHashMap<OrganizationId, UserId>,
}

impl OrgServiceUsers {
    /// Service user of `organization`, if one is configured.
    #[must_use]
    pub fn user_for(&self, organization: &OrganizationId) -> Option<&UserId> {
        self.users.get(organization)
    }

    /// Context for work done on behalf of `organization`.
    #[must_use]
    pub fn context(&self, organization: &OrganizationId) -> Option<OrgContext> {
        self.user_for(organization)
            .map(|user| OrgContext::new(organization.clone(), user.clone()))
    }

    /// Configured organizations in a stable order.
    #[must_use]
    pub fn organizations(&self) -> Vec<&OrganizationId> {
        let mut organizations: Vec<_> = self.users.keys().collect();

        organizations.sort();

        organizations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl FromStr for OrgServiceUsers {
    type Err = OrgServiceUsersError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut users = FxHashMap::default();

        for pair in value.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let Some((organization, user)) = pair.split_once('=') else {
                return Err(OrgServiceUsersError::Malformed(pair.to_string()));
            };

            let (organization, user) = (organization.trim(), user.trim());

            if organization.is_empty() || user.is_empty() {
                return Err(OrgServiceUsersError::Malformed(pair.to_string()));
            }

            if users
                .insert(OrganizationId::new(organization), UserId::new(user))
                .is_some()
            {
                return Err(OrgServiceUsersError::Duplicate(organization.to_string()));
            }
        }

        Ok(Self { users })
    }
}

impl Display for OrgServiceUsers {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let pairs: Vec<_> = self
            .organizations()
            .into_iter()
            .filter_map(|organization| {
                self.user_for(organization)
                    .map(|user| format!("{organization}={user}"))
            })
            .collect();

        f.write_str(&pairs.join(","))
    }
}

/// Per-organization settings.
#[derive(Debug, Args)]
pub struct OrganizationsConfig {
    /// Service user per organization (`org=user,org=user`)
    #[arg(long, env = "ORG_SERVICE_USERS", default_value = "")]
    pub service_users: OrgServiceUsers,

    /// Time zone that decides the current billing day
    #[arg(long, env = "BILLING_TIME_ZONE", default_value = "UTC")]
    pub time_zone: String,
}

impl OrganizationsConfig {
    /// Resolve the configured billing time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA time zone.
    pub fn time_zone(&self) -> Result<TimeZone, jiff::Error> {
        if self.time_zone.eq_ignore_ascii_case("UTC") {
            return Ok(TimeZone::UTC);
        }

        TimeZone::get(&self.time_zone)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_pairs_and_ignores_blanks() -> TestResult {
        let users: OrgServiceUsers = " org-a=user-a, ,org-b = user-b ".parse()?;

        assert_eq!(
            users.user_for(&OrganizationId::new("org-b")),
            Some(&UserId::new("user-b"))
        );
        assert_eq!(users.to_string(), "org-a=user-a,org-b=user-b");

        Ok(())
    }

    #[test]
    fn empty_mapping_is_allowed() -> TestResult {
        let users: OrgServiceUsers = "".parse()?;

        assert!(users.is_empty());

        Ok(())
    }

    #[test]
    fn rejects_pairs_without_user() {
        assert_eq!(
            "org-a=".parse::<OrgServiceUsers>(),
            Err(OrgServiceUsersError::Malformed("org-a=".to_string()))
        );
        assert_eq!(
            "org-a".parse::<OrgServiceUsers>(),
            Err(OrgServiceUsersError::Malformed("org-a".to_string()))
        );
    }

    #[test]
    fn rejects_duplicate_organizations() {
        assert_eq!(
            "org-a=user-a,org-a=user-b".parse::<OrgServiceUsers>(),
            Err(OrgServiceUsersError::Duplicate("org-a".to_string()))
        );
    }

    #[test]
    fn context_impersonates_the_service_user() -> TestResult {
        let users: OrgServiceUsers = "org-a=user-a".parse()?;

        let ctx = users
            .context(&OrganizationId::new("org-a"))
            .ok_or("missing context")?;

        assert_eq!(ctx.user, UserId::new("user-a"));
        assert!(users.context(&OrganizationId::new("org-b")).is_none());

        Ok(())
    }
}
