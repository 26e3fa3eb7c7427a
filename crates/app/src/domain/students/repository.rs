//! Students Repository

use bursar::{
    ids::{OrderId, StudentId, StudentProductId},
    students::StudentProduct,
};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Transaction, postgres::PgRow, query_as, query_scalar};

use crate::database::{
    Record, into_inner, try_get_date, try_get_id, try_get_optional_id, try_get_timestamp,
    try_get_wire,
};

const GET_STUDENT_PRODUCT_SQL: &str = include_str!("sql/get_student_product.sql");
const LIST_STUDENT_PRODUCTS_BY_ORDER_SQL: &str =
    include_str!("sql/list_student_products_by_order.sql");
const LIST_SIBLINGS_SQL: &str = include_str!("sql/list_siblings.sql");
const IS_ENROLLED_SQL: &str = include_str!("sql/is_enrolled.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgStudentsRepository;

impl PgStudentsRepository {
    pub(crate) async fn get_student_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProductId,
    ) -> Result<StudentProduct, sqlx::Error> {
        query_as::<Postgres, Record<StudentProduct>>(GET_STUDENT_PRODUCT_SQL)
            .bind(student_product.as_str())
            .fetch_one(&mut **tx)
            .await
            .map(Record::into_inner)
    }

    pub(crate) async fn list_student_products_by_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderId,
    ) -> Result<Vec<StudentProduct>, sqlx::Error> {
        query_as::<Postgres, Record<StudentProduct>>(LIST_STUDENT_PRODUCTS_BY_ORDER_SQL)
            .bind(order.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn list_siblings(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student: &StudentId,
    ) -> Result<Vec<StudentId>, sqlx::Error> {
        let siblings: Vec<String> = query_scalar(LIST_SIBLINGS_SQL)
            .bind(student.as_str())
            .fetch_all(&mut **tx)
            .await?;

        Ok(siblings.into_iter().map(StudentId::new).collect())
    }

    pub(crate) async fn is_enrolled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student: &StudentId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        query_scalar(IS_ENROLLED_SQL)
            .bind(student.as_str())
            .bind(SqlxTimestamp::from(at))
            .fetch_one(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for Record<StudentProduct> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(StudentProduct {
            id: try_get_id(row, "student_product_id")?,
            student_id: try_get_id(row, "student_id")?,
            location_id: try_get_id(row, "location_id")?,
            product_id: try_get_id(row, "product_id")?,
            status: try_get_wire(row, "product_status")?,
            label: try_get_wire(row, "student_product_label")?,
            start_date: try_get_date(row, "start_date")?,
            end_date: try_get_date(row, "end_date")?,
            updated_from: try_get_optional_id(row, "updated_from_student_product_id")?,
            updated_to: try_get_optional_id(row, "updated_to_student_product_id")?,
            root_student_product: try_get_optional_id(row, "root_student_product_id")?,
            created_at: try_get_timestamp(row, "created_at")?,
        }))
    }
}
