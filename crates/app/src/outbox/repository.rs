//! Outbox Repository

use sqlx::{Postgres, Transaction, query};

use crate::outbox::OutboxEvent;

const INSERT_OUTBOX_EVENT_SQL: &str = include_str!("sql/insert_outbox_event.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgOutboxRepository;

impl PgOutboxRepository {
    pub(crate) async fn insert_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
    ) -> Result<(), sqlx::Error> {
        query(INSERT_OUTBOX_EVENT_SQL)
            .bind(event.topic.as_str())
            .bind(&event.key)
            .bind(&event.payload)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
