//! Billing errors

use bursar::{
    billing::DraftError,
    ids::{BillingSchedulePeriodId, OrderId, ProductId, StudentProductId},
    pricing::PricingError,
};
use thiserror::Error;

/// Errors that stop a billing job before any item is processed.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("failed to load upcoming bill items to generate")]
    UpcomingBillItems(#[source] sqlx::Error),

    #[error("failed to load pending bill items to bill")]
    PendingBillItems(#[source] sqlx::Error),
}

/// Why the next bill item of one upcoming bill item was not generated.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("bill item not found with order_id {order} and product_id {product}")]
    BillItemNotFound { order: OrderId, product: ProductId },

    #[error("no price for product {product} in billing schedule period {period}")]
    PriceNotFound {
        product: ProductId,
        period: BillingSchedulePeriodId,
    },

    #[error("nothing found to {operation} for student product {student_product}")]
    NotFound {
        student_product: StudentProductId,
        operation: &'static str,
    },

    #[error("failed to {operation} for student product {student_product}")]
    Sql {
        student_product: StudentProductId,
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to price bill item for student product {student_product}")]
    Pricing {
        student_product: StudentProductId,
        #[source]
        source: PricingError,
    },
}

impl GenerationError {
    pub(crate) fn storage(
        student_product: &StudentProductId,
        operation: &'static str,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        let student_product = student_product.clone();

        move |source| match source {
            sqlx::Error::RowNotFound => Self::NotFound {
                student_product,
                operation,
            },
            source => Self::Sql {
                student_product,
                operation,
                source,
            },
        }
    }
}

/// Failure to move one bill item to billed.
#[derive(Debug, Error)]
#[error("failed to {operation} for bill item {sequence_number}")]
pub struct BillingStatusError {
    pub sequence_number: i64,
    pub operation: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl BillingStatusError {
    pub(crate) fn storage(
        sequence_number: i64,
        operation: &'static str,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self {
            sequence_number,
            operation,
            source,
        }
    }
}

/// Errors drafting the update order of a discount change.
#[derive(Debug, Error)]
pub enum DiscountDraftError {
    #[error("failed to {operation} for student product {student_product}")]
    Sql {
        student_product: StudentProductId,
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("product {0} has no billing schedule")]
    NotRecurring(ProductId),

    #[error("no price for product {product} in billing schedule period {period}")]
    PriceNotFound {
        product: ProductId,
        period: BillingSchedulePeriodId,
    },

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl DiscountDraftError {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bill_item_names_the_order_and_product() {
        let error = GenerationError::BillItemNotFound {
            order: "order-1".into(),
            product: "product-1".into(),
        };

        assert_eq!(
            error.to_string(),
            "bill item not found with order_id order-1 and product_id product-1"
        );
    }

    #[test]
    fn status_errors_name_the_bill_item() {
        let error = BillingStatusError::storage(42, "mark bill item billed")(sqlx::Error::PoolClosed);

        assert_eq!(
            error.to_string(),
            "failed to mark bill item billed for bill item 42"
        );
    }
}
