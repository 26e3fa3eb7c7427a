//! App Context

use std::sync::Arc;

use bursar::ids::{OrganizationId, UserId};
use jiff::tz::TimeZone;
use thiserror::Error;

use crate::{
    config::organizations::OrgServiceUsers,
    database::{self, Db, PgStore},
    domain::{
        billing::{
            BillItemGeneratorService, BillingStatusService, BillingStatusUpdater,
            RecurringBillItemGenerator, UpdateOrderDrafter,
        },
        discounts::{
            DiscountTagReconciler, DiscountTagReconcilerService, DiscountTracker,
            DiscountTrackerService, HighestDiscountSelector, HighestDiscountService,
        },
    },
    events::{OrderLogHandler, OutboxOrderGateway, UpdateProductDiscountHandler},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply database migrations")]
    Migrations(#[source] sqlx::migrate::MigrateError),
}

/// Organization a unit of work runs for, and the service user it acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgContext {
    pub organization: OrganizationId,
    pub user: UserId,
}

impl OrgContext {
    #[must_use]
    pub fn new(organization: OrganizationId, user: UserId) -> Self {
        Self { organization, user }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub service_users: OrgServiceUsers,
    pub time_zone: TimeZone,
    pub tracker: Arc<dyn DiscountTrackerService>,
    pub reconciler: Arc<dyn DiscountTagReconcilerService>,
    pub selector: Arc<dyn HighestDiscountService>,
    pub generator: Arc<dyn BillItemGeneratorService>,
    pub billing_status: Arc<dyn BillingStatusService>,
    pub order_log: OrderLogHandler,
    pub product_discounts: UpdateProductDiscountHandler,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when connecting to or migrating the database fails.
    pub async fn from_database_url(
        url: &str,
        service_users: OrgServiceUsers,
        time_zone: TimeZone,
    ) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrations)?;

        let db = Db::new(pool);
        let store = Arc::new(PgStore::new(db.clone()));

        let reconciler: Arc<dyn DiscountTagReconcilerService> =
            Arc::new(DiscountTagReconciler::new(store.clone()));
        let tracker: Arc<dyn DiscountTrackerService> =
            Arc::new(DiscountTracker::new(store.clone(), reconciler.clone()));

        Ok(Self {
            order_log: OrderLogHandler::new(tracker.clone(), service_users.clone()),
            product_discounts: UpdateProductDiscountHandler::new(
                Arc::new(UpdateOrderDrafter::new(store.clone())),
                Arc::new(OutboxOrderGateway::new(db)),
                service_users.clone(),
                time_zone.clone(),
            ),
            selector: Arc::new(HighestDiscountSelector::new(store.clone())),
            generator: Arc::new(RecurringBillItemGenerator::new(store.clone())),
            billing_status: Arc::new(BillingStatusUpdater::new(store)),
            service_users,
            time_zone,
            tracker,
            reconciler,
        })
    }
}
