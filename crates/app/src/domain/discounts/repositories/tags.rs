//! User Discount Tags Repository

use bursar::{
    ids::{DiscountTagId, StudentId},
    lifecycle::DiscountType,
    tags::NewUserDiscountTag,
};
use jiff_sqlx::Date as SqlxDate;
use sqlx::{Postgres, Transaction, query, query_scalar};

const LIST_DISCOUNT_TAG_IDS_SQL: &str = include_str!("sql/list_discount_tag_ids.sql");
const SOFT_DELETE_USER_TAGS_SQL: &str = include_str!("sql/soft_delete_user_tags.sql");
const INSERT_USER_TAG_SQL: &str = include_str!("sql/insert_user_tag.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgTagsRepository;

impl PgTagsRepository {
    pub(crate) async fn list_discount_tag_ids(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount_type: DiscountType,
    ) -> Result<Vec<DiscountTagId>, sqlx::Error> {
        let tags: Vec<String> = query_scalar(LIST_DISCOUNT_TAG_IDS_SQL)
            .bind(discount_type.as_str())
            .fetch_all(&mut **tx)
            .await?;

        Ok(tags.into_iter().map(DiscountTagId::new).collect())
    }

    pub(crate) async fn soft_delete_user_tags(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: &StudentId,
        discount_type: DiscountType,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(SOFT_DELETE_USER_TAGS_SQL)
            .bind(user.as_str())
            .bind(discount_type.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn insert_user_tags(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tags: &[NewUserDiscountTag],
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;

        for tag in tags {
            inserted += query(INSERT_USER_TAG_SQL)
                .bind(tag.user_id.as_str())
                .bind(tag.discount_type.as_str())
                .bind(tag.discount_tag_id.as_str())
                .bind(SqlxDate::from(tag.start_date))
                .bind(SqlxDate::from(tag.end_date))
                .execute(&mut **tx)
                .await?
                .rows_affected();
        }

        Ok(inserted)
    }
}
