//! Database connection management

use std::{
    error::Error as StdError,
    fmt::{Debug, Formatter, Result as FmtResult},
    str::FromStr,
};

use bursar::ids::TypedId;
use jiff::{Timestamp, civil::Date};
use jiff_sqlx::{Date as SqlxDate, Timestamp as SqlxTimestamp};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, query};

use crate::context::OrgContext;

/// SQL used to set organization and acting user context for row-level security.
pub const SET_ORGANIZATION_CONTEXT_SQL: &str = "SELECT set_config('app.current_organization', $1, true), set_config('app.current_user', $2, true)";

#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction acting as the organization's service user.
    ///
    /// # Errors
    ///
    /// Returns an error when starting the transaction or setting the context fails.
    pub async fn begin_org_transaction(
        &self,
        ctx: &OrgContext,
    ) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        query(SET_ORGANIZATION_CONTEXT_SQL)
            .bind(ctx.organization.as_str())
            .bind(ctx.user.as_str())
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }
}

/// Connect to `PostgreSQL`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPool::connect(database_url).await
}

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Storage ports backed by `PostgreSQL`.
///
/// Every unit of work is one organization-scoped transaction.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub(crate) async fn begin_unit(&self, ctx: &OrgContext) -> Result<PgUnitOfWork, sqlx::Error> {
        Ok(PgUnitOfWork {
            tx: Some(self.db.begin_org_transaction(ctx).await?),
        })
    }
}

/// An open transaction handed out by [`PgStore`].
///
/// Dropping it without committing rolls the work back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    pub(crate) fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, sqlx::Error> {
        self.tx.as_mut().ok_or_else(finished)
    }

    pub(crate) async fn finish(&mut self) -> Result<(), sqlx::Error> {
        self.tx.take().ok_or_else(finished)?.commit().await
    }
}

impl Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PgUnitOfWork")
            .field("open", &self.tx.is_some())
            .finish()
    }
}

fn finished() -> sqlx::Error {
    sqlx::Error::Protocol("transaction already committed".to_string())
}

/// An engine value decoded from a row.
#[derive(Debug)]
pub(crate) struct Record<T>(pub(crate) T);

impl<T> Record<T> {
    pub(crate) fn into_inner(self) -> T {
        self.0
    }
}

pub(crate) fn into_inner<T>(records: Vec<Record<T>>) -> Vec<T> {
    records.into_iter().map(Record::into_inner).collect()
}

/// Decode a text column holding one of the wire enum strings.
pub(crate) fn try_get_wire<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let value: String = row.try_get(column)?;

    value.parse().map_err(|source| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    })
}

pub(crate) fn try_get_optional_wire<T>(row: &PgRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let value: Option<String> = row.try_get(column)?;

    value
        .map(|value| {
            value.parse().map_err(|source| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(source),
            })
        })
        .transpose()
}

pub(crate) fn try_get_id<T>(row: &PgRow, column: &str) -> sqlx::Result<TypedId<T>> {
    row.try_get::<String, _>(column).map(TypedId::new)
}

pub(crate) fn try_get_optional_id<T>(row: &PgRow, column: &str) -> sqlx::Result<Option<TypedId<T>>> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .filter(|id| !id.trim().is_empty())
        .map(TypedId::new))
}

pub(crate) fn try_get_date(row: &PgRow, column: &str) -> sqlx::Result<Date> {
    Ok(row.try_get::<SqlxDate, _>(column)?.to_jiff())
}

pub(crate) fn try_get_optional_date(row: &PgRow, column: &str) -> sqlx::Result<Option<Date>> {
    Ok(row
        .try_get::<Option<SqlxDate>, _>(column)?
        .map(SqlxDate::to_jiff))
}

pub(crate) fn try_get_timestamp(row: &PgRow, column: &str) -> sqlx::Result<Timestamp> {
    Ok(row.try_get::<SqlxTimestamp, _>(column)?.to_jiff())
}

/// Decode a non-negative integer column.
pub(crate) fn try_get_u32(row: &PgRow, column: &str) -> sqlx::Result<u32> {
    let value: i32 = row.try_get(column)?;

    u32::try_from(value).map_err(|source| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    })
}

/// Encode a count for an integer column.
pub(crate) fn to_i32(value: u32, column: &str) -> sqlx::Result<i32> {
    i32::try_from(value).map_err(|source| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    })
}
