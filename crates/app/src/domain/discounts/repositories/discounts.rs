//! Discounts Repository

use bursar::{
    discounts::Discount,
    ids::{DiscountId, DiscountTagId, LocationId, ProductId, StudentProductId, UserId},
    pricing::DiscountAmount,
    students::StudentProduct,
};
use jiff::{Timestamp, civil::Date};
use jiff_sqlx::{Date as SqlxDate, Timestamp as SqlxTimestamp};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, query_scalar};

use crate::database::{
    Record, into_inner, try_get_id, try_get_optional_id, try_get_timestamp, try_get_wire,
};

const LIST_SELECTION_CANDIDATES_SQL: &str = include_str!("sql/list_selection_candidates.sql");
const LIST_ELIGIBLE_DISCOUNT_TAG_IDS_SQL: &str =
    include_str!("sql/list_eligible_discount_tag_ids.sql");
const LIST_TAG_DISCOUNTS_SQL: &str = include_str!("sql/list_tag_discounts.sql");
const LIST_PRODUCT_DISCOUNTS_SQL: &str = include_str!("sql/list_product_discounts.sql");
const GET_DISCOUNT_SQL: &str = include_str!("sql/get_discount.sql");
const GET_BILLED_DISCOUNT_SQL: &str = include_str!("sql/get_billed_discount.sql");
const LIST_NOTIFICATION_RECIPIENTS_SQL: &str =
    include_str!("sql/list_notification_recipients.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgDiscountsRepository;

impl PgDiscountsRepository {
    pub(crate) async fn list_selection_candidates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        today: Date,
    ) -> Result<Vec<StudentProduct>, sqlx::Error> {
        query_as::<Postgres, Record<StudentProduct>>(LIST_SELECTION_CANDIDATES_SQL)
            .bind(SqlxDate::from(today))
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn list_eligible_discount_tag_ids(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProduct,
        today: Date,
    ) -> Result<Vec<DiscountTagId>, sqlx::Error> {
        let tags: Vec<String> = query_scalar(LIST_ELIGIBLE_DISCOUNT_TAG_IDS_SQL)
            .bind(student_product.student_id.as_str())
            .bind(student_product.product_id.as_str())
            .bind(SqlxDate::from(today))
            .bind(student_product.id.as_str())
            .fetch_all(&mut **tx)
            .await?;

        Ok(tags.into_iter().map(DiscountTagId::new).collect())
    }

    pub(crate) async fn list_tag_discounts(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tags: &[DiscountTagId],
        at: Timestamp,
    ) -> Result<Vec<Discount>, sqlx::Error> {
        let tags: Vec<&str> = tags.iter().map(DiscountTagId::as_str).collect();

        query_as::<Postgres, Record<Discount>>(LIST_TAG_DISCOUNTS_SQL)
            .bind(tags)
            .bind(SqlxTimestamp::from(at))
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn list_product_discounts(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &ProductId,
        at: Timestamp,
    ) -> Result<Vec<Discount>, sqlx::Error> {
        query_as::<Postgres, Record<Discount>>(LIST_PRODUCT_DISCOUNTS_SQL)
            .bind(product.as_str())
            .bind(SqlxTimestamp::from(at))
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn get_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: &DiscountId,
    ) -> Result<Option<Discount>, sqlx::Error> {
        query_as::<Postgres, Record<Discount>>(GET_DISCOUNT_SQL)
            .bind(discount.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map(|record| record.map(Record::into_inner))
    }

    pub(crate) async fn get_billed_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProductId,
    ) -> Result<Option<DiscountId>, sqlx::Error> {
        let discount: Option<Option<String>> = query_scalar(GET_BILLED_DISCOUNT_SQL)
            .bind(student_product.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(discount
            .flatten()
            .filter(|id| !id.trim().is_empty())
            .map(DiscountId::new))
    }

    pub(crate) async fn list_notification_recipients(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        location: &LocationId,
        roles: &[&str],
    ) -> Result<Vec<UserId>, sqlx::Error> {
        let users: Vec<String> = query_scalar(LIST_NOTIFICATION_RECIPIENTS_SQL)
            .bind(location.as_str())
            .bind(roles)
            .fetch_all(&mut **tx)
            .await?;

        Ok(users.into_iter().map(UserId::new).collect())
    }
}

impl<'r> FromRow<'r, PgRow> for Record<Discount> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let recurring_valid_duration: Option<i32> = row.try_get("recurring_valid_duration")?;

        let recurring_valid_duration = recurring_valid_duration
            .map(u32::try_from)
            .transpose()
            .map_err(|source| sqlx::Error::ColumnDecode {
                index: "recurring_valid_duration".to_string(),
                source: Box::new(source),
            })?;

        Ok(Self(Discount {
            id: try_get_id(row, "discount_id")?,
            name: row.try_get("name")?,
            discount_type: try_get_wire(row, "discount_type")?,
            amount: DiscountAmount::from_parts(
                try_get_wire(row, "discount_amount_type")?,
                row.try_get("discount_amount_value")?,
            ),
            discount_tag_id: try_get_optional_id(row, "discount_tag_id")?,
            available_from: try_get_timestamp(row, "available_from")?,
            available_until: try_get_timestamp(row, "available_until")?,
            recurring_valid_duration,
        }))
    }
}
