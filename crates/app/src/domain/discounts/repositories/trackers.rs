//! Discount Trackers Repository

use bursar::{
    ids::{DiscountTrackerId, ProductId, StudentId, StudentProductId},
    lifecycle::DiscountType,
    students::StudentProduct,
    tracking::{NewDiscountTracker, ProductGroup, StudentDiscountTracker},
};
use jiff_sqlx::Date as SqlxDate;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::database::{
    Record, into_inner, try_get_date, try_get_id, try_get_optional_date, try_get_optional_id,
    try_get_timestamp, try_get_wire,
};

const LIST_PRODUCT_GROUPS_SQL: &str = include_str!("sql/list_product_groups.sql");
const LIST_ACTIVE_TRACKERS_SQL: &str = include_str!("sql/list_active_trackers.sql");
const LIST_ACTIVE_TRACKERS_OF_STUDENTS_SQL: &str =
    include_str!("sql/list_active_trackers_of_students.sql");
const INSERT_TRACKER_SQL: &str = include_str!("sql/insert_tracker.sql");
const SUPERSEDE_TRACKER_SQL: &str = include_str!("sql/supersede_tracker.sql");
const UPDATE_TRACKING_DURATION_SQL: &str = include_str!("sql/update_tracking_duration.sql");
const EXPIRE_TRACKERS_SQL: &str = include_str!("sql/expire_trackers.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgTrackersRepository;

impl PgTrackersRepository {
    pub(crate) async fn list_product_groups(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &ProductId,
    ) -> Result<Vec<ProductGroup>, sqlx::Error> {
        query_as::<Postgres, Record<ProductGroup>>(LIST_PRODUCT_GROUPS_SQL)
            .bind(product.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn list_active_trackers(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProductId,
    ) -> Result<Vec<StudentDiscountTracker>, sqlx::Error> {
        query_as::<Postgres, Record<StudentDiscountTracker>>(LIST_ACTIVE_TRACKERS_SQL)
            .bind(student_product.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn list_active_trackers_of_students(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        students: &[StudentId],
        discount_type: DiscountType,
    ) -> Result<Vec<StudentDiscountTracker>, sqlx::Error> {
        let students: Vec<&str> = students.iter().map(StudentId::as_str).collect();

        query_as::<Postgres, Record<StudentDiscountTracker>>(LIST_ACTIVE_TRACKERS_OF_STUDENTS_SQL)
            .bind(students)
            .bind(discount_type.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn insert_tracker(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tracker: &NewDiscountTracker,
    ) -> Result<DiscountTrackerId, sqlx::Error> {
        let id: String = query_scalar(INSERT_TRACKER_SQL)
            .bind(tracker.student_id.as_str())
            .bind(tracker.location_id.as_str())
            .bind(tracker.student_product_id.as_str())
            .bind(tracker.product_id.as_str())
            .bind(tracker.product_group_id.as_str())
            .bind(tracker.discount_type.as_str())
            .bind(SqlxDate::from(tracker.student_product_start_date))
            .bind(SqlxDate::from(tracker.student_product_end_date))
            .bind(tracker.supersedes.as_ref().map(DiscountTrackerId::as_str))
            .fetch_one(&mut **tx)
            .await?;

        let id = DiscountTrackerId::new(id);

        if let Some(superseded) = &tracker.supersedes {
            query(SUPERSEDE_TRACKER_SQL)
                .bind(superseded.as_str())
                .bind(id.as_str())
                .execute(&mut **tx)
                .await?;
        }

        Ok(id)
    }

    pub(crate) async fn update_tracking_duration(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProduct,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(UPDATE_TRACKING_DURATION_SQL)
            .bind(student_product.id.as_str())
            .bind(SqlxDate::from(student_product.start_date))
            .bind(SqlxDate::from(student_product.end_date))
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn expire_trackers(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProductId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(EXPIRE_TRACKERS_SQL)
            .bind(student_product.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for Record<ProductGroup> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(ProductGroup {
            id: try_get_id(row, "product_group_id")?,
            discount_type: try_get_wire(row, "discount_type")?,
        }))
    }
}

impl<'r> FromRow<'r, PgRow> for Record<StudentDiscountTracker> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(StudentDiscountTracker {
            id: try_get_id(row, "discount_tracker_id")?,
            student_id: try_get_id(row, "student_id")?,
            location_id: try_get_id(row, "location_id")?,
            student_product_id: try_get_id(row, "student_product_id")?,
            product_id: try_get_id(row, "product_id")?,
            product_group_id: try_get_id(row, "product_group_id")?,
            discount_type: try_get_wire(row, "discount_type")?,
            discount_status: row.try_get("discount_status")?,
            discount_start_date: try_get_optional_date(row, "discount_start_date")?,
            discount_end_date: try_get_optional_date(row, "discount_end_date")?,
            student_product_start_date: try_get_date(row, "student_product_start_date")?,
            student_product_end_date: try_get_date(row, "student_product_end_date")?,
            updated_from: try_get_optional_id(row, "updated_from_discount_tracker_id")?,
            updated_to: try_get_optional_id(row, "updated_to_discount_tracker_id")?,
            created_at: try_get_timestamp(row, "created_at")?,
        }))
    }
}
