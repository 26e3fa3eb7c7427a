//! Test context for storage-backed tests.

use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction, query, raw_sql};

use crate::{
    context::OrgContext,
    database::{Db, PgStore},
    test::{
        db::{SUPERUSER, SUPERUSER_PASSWORD, TestDb, url},
        fixtures::org,
    },
};

/// Non-superuser role the stores connect as, so row-level security applies.
const APP_ROLE: &str = "bursar_app_test";
const APP_ROLE_PASSWORD: &str = "bursar_app_test_pass";

pub struct TestContext {
    pub test_db: TestDb,
    pub db: Db,
    pub store: PgStore,
    pub org: OrgContext,
}

impl TestContext {
    pub async fn new() -> Self {
        let test_db = TestDb::new().await;
        let db = Db::new(Self::app_pool(&test_db).await);

        Self {
            store: PgStore::new(db.clone()),
            db,
            test_db,
            org: org(),
        }
    }

    /// Run `sql` inside an organization transaction and commit it.
    ///
    /// Seeded rows pick up the organization through their `resource_path` default.
    pub async fn seed(&self, ctx: &OrgContext, sql: &str) {
        let mut tx = self
            .db
            .begin_org_transaction(ctx)
            .await
            .expect("Failed to begin seed transaction");

        raw_sql(sql)
            .execute(&mut *tx)
            .await
            .expect("Failed to seed test data");

        tx.commit().await.expect("Failed to commit seed data");
    }

    /// Open a transaction as the default test organization.
    pub async fn begin(&self) -> Transaction<'static, Postgres> {
        self.db
            .begin_org_transaction(&self.org)
            .await
            .expect("Failed to begin test transaction")
    }

    /// Create the app role (once per server) and connect to the test database as it.
    ///
    /// Superusers bypass row-level security even when it is forced.
    async fn app_pool(test_db: &TestDb) -> PgPool {
        let admin_url = url(SUPERUSER, SUPERUSER_PASSWORD, test_db.port, "postgres");

        let mut server = PgConnection::connect(&admin_url)
            .await
            .expect("Failed to connect for role setup");

        let created = query(&format!(
            "CREATE ROLE {APP_ROLE} WITH LOGIN PASSWORD '{APP_ROLE_PASSWORD}' \
               NOSUPERUSER NOCREATEDB NOCREATEROLE"
        ))
        .execute(&mut server)
        .await;

        // Parallel tests race to create the role; losing the race is fine.
        if let Err(error) = created {
            let exists = error
                .as_database_error()
                .and_then(|error| error.code())
                .is_some_and(|code| code == "42710" || code == "23505");

            assert!(exists, "Failed to create app role: {error}");
        }

        query(&format!(
            "GRANT CONNECT ON DATABASE \"{}\" TO {APP_ROLE}",
            test_db.name
        ))
        .execute(&mut server)
        .await
        .expect("Failed to grant CONNECT on test database");

        server
            .close()
            .await
            .expect("Failed to close server connection");

        for grant in [
            format!("GRANT USAGE ON SCHEMA public TO {APP_ROLE}"),
            format!(
                "GRANT SELECT, INSERT, UPDATE, DELETE ON ALL TABLES IN SCHEMA public TO {APP_ROLE}"
            ),
            format!("GRANT USAGE, SELECT ON ALL SEQUENCES IN SCHEMA public TO {APP_ROLE}"),
        ] {
            query(&grant)
                .execute(test_db.pool())
                .await
                .expect("Failed to grant table privileges to app role");
        }

        PgPool::connect(&url(
            APP_ROLE,
            APP_ROLE_PASSWORD,
            test_db.port,
            &test_db.name,
        ))
        .await
        .expect("Failed to create app pool")
    }
}
