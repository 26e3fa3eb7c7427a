//! Products, Prices and Taxes Repository

use bursar::{
    billing::{BillableProduct, ProductPrice, Tax},
    ids::{BillingSchedulePeriodId, ProductId, TaxId},
};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};

use crate::database::{Record, into_inner, try_get_id, try_get_optional_id, try_get_wire};

const GET_BILLABLE_PRODUCT_SQL: &str = include_str!("sql/get_billable_product.sql");
const LIST_PRODUCT_PRICES_SQL: &str = include_str!("sql/list_product_prices.sql");
const GET_TAX_SQL: &str = include_str!("sql/get_tax.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgCatalogRepository;

impl PgCatalogRepository {
    pub(crate) async fn get_billable_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &ProductId,
    ) -> Result<BillableProduct, sqlx::Error> {
        query_as::<Postgres, Record<BillableProduct>>(GET_BILLABLE_PRODUCT_SQL)
            .bind(product.as_str())
            .fetch_one(&mut **tx)
            .await
            .map(Record::into_inner)
    }

    pub(crate) async fn list_product_prices(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &ProductId,
        period: &BillingSchedulePeriodId,
    ) -> Result<Vec<ProductPrice>, sqlx::Error> {
        query_as::<Postgres, Record<ProductPrice>>(LIST_PRODUCT_PRICES_SQL)
            .bind(product.as_str())
            .bind(period.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn get_tax(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tax: &TaxId,
    ) -> Result<Option<Tax>, sqlx::Error> {
        query_as::<Postgres, Record<Tax>>(GET_TAX_SQL)
            .bind(tax.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map(|record| record.map(Record::into_inner))
    }
}

impl<'r> FromRow<'r, PgRow> for Record<BillableProduct> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(BillableProduct {
            id: try_get_id(row, "product_id")?,
            name: row.try_get("name")?,
            billing_schedule_id: try_get_optional_id(row, "billing_schedule_id")?,
            disable_pro_rating: row.try_get("disable_pro_rating_flag")?,
        }))
    }
}

impl<'r> FromRow<'r, PgRow> for Record<ProductPrice> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(ProductPrice {
            product_id: try_get_id(row, "product_id")?,
            billing_schedule_period_id: try_get_optional_id(row, "billing_schedule_period_id")?,
            price_type: try_get_wire(row, "price_type")?,
            price: row.try_get("price")?,
        }))
    }
}

impl<'r> FromRow<'r, PgRow> for Record<Tax> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(Tax {
            id: try_get_id(row, "tax_id")?,
            name: row.try_get("name")?,
            percentage: row.try_get("tax_percentage")?,
            category: try_get_wire(row, "tax_category")?,
        }))
    }
}
