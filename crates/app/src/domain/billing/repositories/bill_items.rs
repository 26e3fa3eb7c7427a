//! Bill Items Repository

use bursar::{
    billing::{BillItem, BillLine, BilledDiscount, BilledTax, UpcomingBillItem},
    ids::{BillingSchedulePeriodId, DiscountId, OrderId, ProductId, StudentProductId, TaxId},
    pricing::{BillingRatio, DiscountAmount},
};
use jiff::civil::Date;
use jiff_sqlx::Date as SqlxDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::database::{
    Record, into_inner, to_i32, try_get_date, try_get_id, try_get_optional_id,
    try_get_optional_wire, try_get_wire,
};

const LIST_DUE_UPCOMING_BILL_ITEMS_SQL: &str = include_str!("sql/list_due_upcoming_bill_items.sql");
const LIST_RECURRING_BILL_ITEMS_SQL: &str = include_str!("sql/list_recurring_bill_items.sql");
const GET_LATEST_BILL_ITEM_FOR_PERIOD_SQL: &str =
    include_str!("sql/get_latest_bill_item_for_period.sql");
const INSERT_BILL_ITEM_SQL: &str = include_str!("sql/insert_bill_item.sql");
const INSERT_UPCOMING_BILL_ITEM_SQL: &str = include_str!("sql/insert_upcoming_bill_item.sql");
const MARK_UPCOMING_BILL_ITEM_GENERATED_SQL: &str =
    include_str!("sql/mark_upcoming_bill_item_generated.sql");
const NOTE_UPCOMING_BILL_ITEM_SQL: &str = include_str!("sql/note_upcoming_bill_item.sql");
const LIST_DUE_PENDING_BILL_ITEMS_SQL: &str = include_str!("sql/list_due_pending_bill_items.sql");
const MARK_BILL_ITEM_BILLED_SQL: &str = include_str!("sql/mark_bill_item_billed.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgBillItemsRepository;

impl PgBillItemsRepository {
    pub(crate) async fn list_due_upcoming_bill_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        today: Date,
    ) -> Result<Vec<UpcomingBillItem>, sqlx::Error> {
        query_as::<Postgres, Record<UpcomingBillItem>>(LIST_DUE_UPCOMING_BILL_ITEMS_SQL)
            .bind(SqlxDate::from(today))
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn list_recurring_bill_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderId,
        product: &ProductId,
    ) -> Result<Vec<BillItem>, sqlx::Error> {
        query_as::<Postgres, Record<BillItem>>(LIST_RECURRING_BILL_ITEMS_SQL)
            .bind(order.as_str())
            .bind(product.as_str())
            .fetch_all(&mut **tx)
            .await
            .map(into_inner)
    }

    pub(crate) async fn get_latest_bill_item_for_period(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        student_product: &StudentProductId,
        period: &BillingSchedulePeriodId,
    ) -> Result<Option<BillItem>, sqlx::Error> {
        let bill_item = query_as::<Postgres, Record<BillItem>>(GET_LATEST_BILL_ITEM_FOR_PERIOD_SQL)
            .bind(student_product.as_str())
            .bind(period.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(bill_item.map(Record::into_inner))
    }

    pub(crate) async fn insert_bill_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bill_item: &BillLine,
    ) -> Result<i64, sqlx::Error> {
        let discount = bill_item.discount.as_ref();
        let tax = bill_item.tax.as_ref();
        let ratio = bill_item
            .billing_ratio
            .map(|ratio| {
                Ok::<_, sqlx::Error>((
                    to_i32(ratio.numerator(), "billing_ratio_numerator")?,
                    to_i32(ratio.denominator(), "billing_ratio_denominator")?,
                ))
            })
            .transpose()?;

        query_scalar(INSERT_BILL_ITEM_SQL)
            .bind(bill_item.order_id.as_str())
            .bind(bill_item.student_id.as_str())
            .bind(bill_item.location_id.as_str())
            .bind(bill_item.student_product_id.as_str())
            .bind(bill_item.product_id.as_str())
            .bind(&bill_item.product_description)
            .bind(bill_item.billing_status.as_str())
            .bind(bill_item.billing_type.as_str())
            .bind(SqlxDate::from(bill_item.billing_date))
            .bind(SqlxDate::from(bill_item.billing_from))
            .bind(SqlxDate::from(bill_item.billing_to))
            .bind(bill_item.billing_schedule_period_id.as_ref().map(BillingSchedulePeriodId::as_str))
            .bind(bill_item.price)
            .bind(bill_item.final_price)
            .bind(discount.map(|d| d.discount_id.as_str()))
            .bind(discount.and_then(|d| d.discount_name.as_deref()))
            .bind(discount.map(|d| d.amount.amount_type().as_str()))
            .bind(discount.map(|d| d.amount.value()))
            .bind(discount.map(|d| d.discount_amount))
            .bind(discount.map(|d| d.raw_discount_amount))
            .bind(tax.map(|t| t.tax_id.as_str()))
            .bind(tax.map(|t| t.category.as_str()))
            .bind(tax.map(|t| t.percentage))
            .bind(tax.map(|t| t.tax_amount))
            .bind(ratio.map(|(numerator, _)| numerator))
            .bind(ratio.map(|(_, denominator)| denominator))
            .bind(bill_item.adjustment_price)
            .bind(bill_item.is_latest)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn insert_upcoming_bill_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        upcoming: &UpcomingBillItem,
    ) -> Result<(), sqlx::Error> {
        query(INSERT_UPCOMING_BILL_ITEM_SQL)
            .bind(upcoming.order_id.as_str())
            .bind(upcoming.product_id.as_str())
            .bind(upcoming.student_product_id.as_str())
            .bind(upcoming.billing_schedule_period_id.as_str())
            .bind(SqlxDate::from(upcoming.billing_date))
            .bind(&upcoming.product_description)
            .bind(upcoming.discount_id.as_ref().map(DiscountId::as_str))
            .bind(upcoming.tax_id.as_ref().map(TaxId::as_str))
            .bind(upcoming.is_generated)
            .bind(upcoming.execute_note.as_deref())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn mark_upcoming_bill_item_generated(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        upcoming: &UpcomingBillItem,
        note: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        query(MARK_UPCOMING_BILL_ITEM_GENERATED_SQL)
            .bind(upcoming.order_id.as_str())
            .bind(upcoming.product_id.as_str())
            .bind(upcoming.billing_schedule_period_id.as_str())
            .bind(note)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn note_upcoming_bill_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        upcoming: &UpcomingBillItem,
        note: &str,
    ) -> Result<(), sqlx::Error> {
        query(NOTE_UPCOMING_BILL_ITEM_SQL)
            .bind(upcoming.order_id.as_str())
            .bind(upcoming.product_id.as_str())
            .bind(upcoming.billing_schedule_period_id.as_str())
            .bind(note)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn list_due_pending_bill_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        today: Date,
    ) -> Result<Vec<i64>, sqlx::Error> {
        query_scalar(LIST_DUE_PENDING_BILL_ITEMS_SQL)
            .bind(SqlxDate::from(today))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn mark_bill_item_billed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sequence_number: i64,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(MARK_BILL_ITEM_BILLED_SQL)
            .bind(sequence_number)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for Record<UpcomingBillItem> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(UpcomingBillItem {
            order_id: try_get_id(row, "order_id")?,
            product_id: try_get_id(row, "product_id")?,
            student_product_id: try_get_id(row, "student_product_id")?,
            billing_schedule_period_id: try_get_id(row, "billing_schedule_period_id")?,
            billing_date: try_get_date(row, "billing_date")?,
            product_description: row.try_get("product_description")?,
            discount_id: try_get_optional_id(row, "discount_id")?,
            tax_id: try_get_optional_id(row, "tax_id")?,
            is_generated: row.try_get("is_generated")?,
            execute_note: row.try_get("execute_note")?,
        }))
    }
}

impl<'r> FromRow<'r, PgRow> for Record<BillItem> {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(BillItem {
            sequence_number: row.try_get("bill_item_sequence_number")?,
            line: BillLine {
                order_id: try_get_id(row, "order_id")?,
                student_id: try_get_id(row, "student_id")?,
                location_id: try_get_id(row, "location_id")?,
                student_product_id: try_get_id(row, "student_product_id")?,
                product_id: try_get_id(row, "product_id")?,
                product_description: row.try_get("product_description")?,
                billing_status: try_get_wire(row, "billing_status")?,
                billing_type: try_get_wire(row, "billing_type")?,
                billing_date: try_get_date(row, "billing_date")?,
                billing_from: try_get_date(row, "billing_from")?,
                billing_to: try_get_date(row, "billing_to")?,
                billing_schedule_period_id: try_get_optional_id(row, "billing_schedule_period_id")?,
                price: row.try_get("price")?,
                final_price: row.try_get("final_price")?,
                discount: billed_discount(row)?,
                tax: billed_tax(row)?,
                billing_ratio: billing_ratio(row)?,
                adjustment_price: row.try_get("adjustment_price")?,
                is_latest: row.try_get("is_latest_bill_item")?,
            },
        }))
    }
}

fn billed_discount(row: &PgRow) -> sqlx::Result<Option<BilledDiscount>> {
    let Some(discount_id) = try_get_optional_id(row, "discount_id")? else {
        return Ok(None);
    };

    let Some(amount_type) = try_get_optional_wire(row, "discount_amount_type")? else {
        return Ok(None);
    };

    let value: Option<Decimal> = row.try_get("discount_amount_value")?;
    let discount_amount: Option<Decimal> = row.try_get("discount_amount")?;
    let raw_discount_amount: Option<Decimal> = row.try_get("raw_discount_amount")?;

    Ok(Some(BilledDiscount {
        discount_id,
        discount_name: row.try_get("discount_name")?,
        amount: DiscountAmount::from_parts(amount_type, value.unwrap_or_default()),
        discount_amount: discount_amount.unwrap_or_default(),
        raw_discount_amount: raw_discount_amount.or(discount_amount).unwrap_or_default(),
    }))
}

fn billed_tax(row: &PgRow) -> sqlx::Result<Option<BilledTax>> {
    let Some(tax_id) = try_get_optional_id(row, "tax_id")? else {
        return Ok(None);
    };

    let Some(category) = try_get_optional_wire(row, "tax_category")? else {
        return Ok(None);
    };

    let percentage: Option<Decimal> = row.try_get("tax_percentage")?;
    let tax_amount: Option<Decimal> = row.try_get("tax_amount")?;

    Ok(Some(BilledTax {
        tax_id,
        category,
        percentage: percentage.unwrap_or_default(),
        tax_amount: tax_amount.unwrap_or_default(),
    }))
}

fn billing_ratio(row: &PgRow) -> sqlx::Result<Option<BillingRatio>> {
    let numerator: Option<i32> = row.try_get("billing_ratio_numerator")?;
    let denominator: Option<i32> = row.try_get("billing_ratio_denominator")?;

    let (Some(numerator), Some(denominator)) = (numerator, denominator) else {
        return Ok(None);
    };

    ratio_from_columns(numerator, denominator).map(Some)
}

/// Decode a ratio stored as two integer columns.
pub(crate) fn ratio_from_columns(numerator: i32, denominator: i32) -> sqlx::Result<BillingRatio> {
    let decode = |source: Box<dyn std::error::Error + Send + Sync>| sqlx::Error::ColumnDecode {
        index: "billing_ratio".to_string(),
        source,
    };

    let numerator = u32::try_from(numerator).map_err(|e| decode(Box::new(e)))?;
    let denominator = u32::try_from(denominator).map_err(|e| decode(Box::new(e)))?;

    BillingRatio::new(numerator, denominator).map_err(|e| decode(Box::new(e)))
}
