//! Discount service errors.

use bursar::ids::{StudentId, StudentProductId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("nothing found to {operation}")]
    NotFound { operation: &'static str },

    #[error("failed to {operation}")]
    Sql {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl TrackerError {
    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| match source {
            sqlx::Error::RowNotFound => Self::NotFound { operation },
            source => Self::Sql { operation, source },
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to {operation} for student {student}")]
pub struct TagReconcilerError {
    pub student: StudentId,
    pub operation: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl TagReconcilerError {
    pub(crate) fn storage(
        student: &StudentId,
        operation: &'static str,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        let student = student.clone();

        move |source| Self {
            student,
            operation,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscountSelectionError {
    #[error("failed to load student products to select discounts for")]
    Candidates(#[source] sqlx::Error),

    #[error("failed to {operation} for student product {student_product}")]
    Sql {
        student_product: StudentProductId,
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to encode event for student product {student_product}")]
    Encode {
        student_product: StudentProductId,
        #[source]
        source: serde_json::Error,
    },
}

impl DiscountSelectionError {
    pub(crate) fn storage(
        student_product: &StudentProductId,
        operation: &'static str,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        let student_product = student_product.clone();

        move |source| Self::Sql {
            student_product,
            operation,
            source,
        }
    }
}
