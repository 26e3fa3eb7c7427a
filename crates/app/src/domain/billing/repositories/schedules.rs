//! Billing Schedules Repository

use bursar::{
    billing::BillingSchedulePeriod,
    ids::{BillingScheduleId, BillingSchedulePeriodId},
    pricing::BillingRatio,
};
use jiff::civil::Date;
use jiff_sqlx::Date as SqlxDate;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use super::bill_items::ratio_from_columns;
use crate::database::{Record, into_inner, try_get_date, try_get_id};

const GET_BILLING_SCHEDULE_PERIOD_SQL: &str = include_str!("sql/get_billing_schedule_period.sql");
const GET_LAST_BILLING_SCHEDULE_PERIOD_SQL: &str =
    include_str!("sql/get_last_billing_schedule_period.sql");
const GET_NEXT_BILLING_SCHEDULE_PERIOD_SQL: &str =
    include_str!("sql/get_next_billing_schedule_period.sql");
const LIST_BILLING_SCHEDULE_PERIODS_SQL: &str =
    include_str!("sql/list_billing_schedule_periods.sql");
const GET_BILLING_RATIO_SQL: &str = include_str!("sql/get_billing_ratio.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgSchedulesRepository;

impl PgSchedulesRepository {
    pub(crate) async fn get_billing_schedule_period(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        period: &BillingSchedulePeriodId,
    ) -> Result<BillingSchedulePeriod, sqlx::Error> {
        query_as::<Postgres, Record<BillingSchedulePeriod>>(GET_BILLING_SCHEDULE_PERIOD_SQL)
            .bind(period.as_str())
            .fetch_one(&mut **tx)
            .await
            .map(Record::into_inner)
    }

    pub(crate) async fn get_last_billing_schedule_period(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        schedule: &BillingScheduleId,
    ) -> Result<BillingSchedulePeriod, sqlx::Error> {
        query_as::<Postgres, Record<BillingSchedulePeriod>>(GET_LAST_BILLING_SCHEDULE_PERIOD_SQL)
            .bind(schedule.as_str())
            .fetch_one(&mut **tx)
            .await
            .map(Record::into_inner)
    }

    pub(crate) async fn get_next_billing_schedule_period(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        current: &BillingSchedulePeriod,
    ) -> Result<BillingSchedulePeriod, sqlx::Error> {
        query_as::<Postgres, Record<BillingSchedulePeriod>>(GET_NEXT_BILLING_SCHEDULE_PERIOD_SQL)
            .bind(current.billing_schedule_id.as_str())
            .bind(SqlxDate::from(current.start_date))
            .fetch_one(&mut **tx)
            .await
            .map(Record::into_inner)
    }

    pub(crate) async fn list_billing_schedule_periods(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        schedule: &BillingScheduleId,
    ) -> Result<Vec<BillingSchedulePeriod>, sqlx::Error> {
        query_as::<Postgres, Record<BillingSchedulePeriod>>(LIST_BILLING_SCHEDULE_PERIODS_SQL)
            .bind(schedule.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn get_billing_ratio(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        period: &BillingSchedulePeriodId,
        from: Date,
    ) -> Result<Option<BillingRatio>, sqlx::Error> {
        let row = query(GET_BILLING_RATIO_SQL)
            .bind(period.as_str())
            .bind(SqlxDate::from(from))
            .fetch_optional(&mut **tx)
            .await?;

        row.map(|row| {
            ratio_from_columns(
                row.try_get("billing_ratio_numerator")?,
                row.try_get("billing_ratio_denominator")?,
            )
        })
        .transpose()
    }
}

impl<'r> FromRow<'r, PgRow> for Record<BillingSchedulePeriod> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(BillingSchedulePeriod {
            id: try_get_id(row, "billing_schedule_period_id")?,
            billing_schedule_id: try_get_id(row, "billing_schedule_id")?,
            name: row.try_get("name")?,
            start_date: try_get_date(row, "start_date")?,
            end_date: try_get_date(row, "end_date")?,
            billing_date: try_get_date(row, "billing_date")?,
        }))
    }
}
