//! Recurring Billing
//!
//! Bill items of recurring products are produced one billing-schedule period
//! at a time. Each generated item is paired with an [`UpcomingBillItem`]
//! marker so the next run knows which period to continue from; the marker of
//! the schedule's last period is terminal.
//!
//! A change of discount re-prices every period the change touches and drafts
//! the bill items of the resulting update order, see [`draft_discount_update`].

use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    discounts::{Discount, UpdateProductDiscount},
    ids::{
        BillingScheduleId, BillingSchedulePeriodId, DiscountId, LocationId, OrderId, ProductId,
        StudentId, StudentProductId, TaxId,
    },
    lifecycle::{BillingStatus, BillingType, ProductPriceType, TaxCategory},
    pricing::{
        BillingRatio, DiscountAmount, PricingError, adjustment_price, round_to_unit, tax_amount,
    },
};

/// Errors raised while drafting bill items.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftError {
    /// No period of the schedule had a bill item to re-price.
    #[error("no bill item generated for student product {0}")]
    NoBillItems(StudentProductId),

    /// Price calculation failed.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// A recurring product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillableProduct {
    pub id: ProductId,
    pub name: String,
    pub billing_schedule_id: Option<BillingScheduleId>,

    /// Bill partial periods in full.
    pub disable_pro_rating: bool,
}

/// One period of a billing schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSchedulePeriod {
    pub id: BillingSchedulePeriodId,
    pub billing_schedule_id: BillingScheduleId,
    pub name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub billing_date: Date,
}

impl BillingSchedulePeriod {
    /// Whether the period ends before `start` or starts after `end`.
    #[must_use]
    pub fn is_outside(&self, start: Date, end: Date) -> bool {
        self.end_date < start || self.start_date > end
    }

    /// Whether billing from `day` covers only part of the period.
    #[must_use]
    pub fn splits_at(&self, day: Date) -> bool {
        self.start_date < day && day <= self.end_date
    }
}

/// A tax master-data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    pub id: TaxId,
    pub name: String,
    pub percentage: Decimal,
    pub category: TaxCategory,
}

/// A product price row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub product_id: ProductId,
    pub billing_schedule_period_id: Option<BillingSchedulePeriodId>,
    pub price_type: ProductPriceType,
    pub price: Decimal,
}

/// The price tier for a student: enrolled when they are enrolled and the tier exists.
#[must_use]
pub fn price_for(prices: &[ProductPrice], enrolled: bool) -> Option<&ProductPrice> {
    let find = |tier| prices.iter().find(|price| price.price_type == tier);

    enrolled
        .then(|| find(ProductPriceType::Enrolled))
        .flatten()
        .or_else(|| find(ProductPriceType::Default))
}

/// Discount snapshot stored on a bill item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilledDiscount {
    pub discount_id: DiscountId,
    pub discount_name: Option<String>,
    pub amount: DiscountAmount,

    /// Discount off the price, rounded to whole units.
    pub discount_amount: Decimal,

    /// Discount off the price before rounding.
    pub raw_discount_amount: Decimal,
}

impl BilledDiscount {
    /// Snapshot `amount` applied to `price`.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the calculation does not fit.
    pub fn on_price(
        discount_id: DiscountId,
        discount_name: Option<String>,
        amount: DiscountAmount,
        price: Decimal,
    ) -> Result<Self, PricingError> {
        let raw_discount_amount = amount.amount_on(price)?;

        Ok(Self {
            discount_id,
            discount_name,
            amount,
            discount_amount: round_to_unit(raw_discount_amount),
            raw_discount_amount,
        })
    }
}

/// Tax snapshot stored on a bill item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilledTax {
    pub tax_id: TaxId,
    pub category: TaxCategory,
    pub percentage: Decimal,
    pub tax_amount: Decimal,
}

impl BilledTax {
    /// Snapshot `tax` charged on `amount`.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the calculation does not fit.
    pub fn on_amount(tax: &Tax, amount: Decimal) -> Result<Self, PricingError> {
        Ok(Self {
            tax_id: tax.id.clone(),
            category: tax.category,
            percentage: tax.percentage,
            tax_amount: tax_amount(amount, tax.percentage, tax.category)?,
        })
    }
}

/// Fields of a bill item line, shared by persisted and new items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLine {
    pub order_id: OrderId,
    pub student_id: StudentId,
    pub location_id: LocationId,
    pub student_product_id: StudentProductId,
    pub product_id: ProductId,
    pub product_description: String,
    pub billing_status: BillingStatus,
    pub billing_type: BillingType,
    pub billing_date: Date,
    pub billing_from: Date,
    pub billing_to: Date,
    pub billing_schedule_period_id: Option<BillingSchedulePeriodId>,
    pub price: Decimal,
    pub final_price: Decimal,
    pub discount: Option<BilledDiscount>,
    pub tax: Option<BilledTax>,

    /// Proration applied to the period; `None` for whole periods.
    pub billing_ratio: Option<BillingRatio>,
    pub adjustment_price: Option<Decimal>,
    pub is_latest: bool,
}

/// A persisted bill item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillItem {
    pub sequence_number: i64,
    #[serde(flatten)]
    pub line: BillLine,
}

/// Marker of a bill item whose successor still needs generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingBillItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub student_product_id: StudentProductId,
    pub billing_schedule_period_id: BillingSchedulePeriodId,
    pub billing_date: Date,
    pub product_description: String,
    pub discount_id: Option<DiscountId>,
    pub tax_id: Option<TaxId>,
    pub is_generated: bool,
    pub execute_note: Option<String>,
}

/// Whether the current period is the last one of its schedule.
#[must_use]
pub fn is_last_period(current: &BillingSchedulePeriod, last: &BillingSchedulePeriod) -> bool {
    current.id == last.id
}

/// Inputs for generating the bill item of the period after the latest one.
#[derive(Debug, Clone, Copy)]
pub struct NextBillItem<'a> {
    /// Latest bill item of the order and product.
    pub latest: &'a BillItem,

    /// Period to bill.
    pub period: &'a BillingSchedulePeriod,

    /// Price of the student's tier for the period.
    pub price: Decimal,

    /// Discount that still applies, if any.
    pub discount: Option<&'a Discount>,

    /// Tax of the latest bill item, if any.
    pub tax: Option<&'a Tax>,

    /// Current day.
    pub today: Date,
}

/// A generated bill item and the marker that continues the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBillItem {
    pub bill_item: BillLine,
    pub upcoming: UpcomingBillItem,
}

/// Bill the next period in full.
///
/// Generated-ahead periods are never prorated, so the ratio is cleared. The
/// item stays pending until the period's billing date.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if a price calculation does not fit.
pub fn next_bill_item(next: NextBillItem<'_>) -> Result<GeneratedBillItem, PricingError> {
    let NextBillItem {
        latest,
        period,
        price,
        discount,
        tax,
        today,
    } = next;

    let upcoming = period.billing_date > today;

    let discount = discount
        .map(|discount| {
            BilledDiscount::on_price(
                discount.id.clone(),
                Some(discount.name.clone()),
                discount.amount,
                price,
            )
        })
        .transpose()?;

    let final_price = discounted(price, discount.as_ref())?;

    let tax = tax.map(|tax| BilledTax::on_amount(tax, final_price)).transpose()?;

    let bill_item = BillLine {
        order_id: latest.line.order_id.clone(),
        student_id: latest.line.student_id.clone(),
        location_id: latest.line.location_id.clone(),
        student_product_id: latest.line.student_product_id.clone(),
        product_id: latest.line.product_id.clone(),
        product_description: latest.line.product_description.clone(),
        billing_status: BillingStatus::for_generated(upcoming),
        billing_type: BillingType::for_generated(upcoming),
        billing_date: period.billing_date.max(today),
        billing_from: period.start_date,
        billing_to: period.end_date,
        billing_schedule_period_id: Some(period.id.clone()),
        price,
        final_price,
        discount,
        tax,
        billing_ratio: None,
        adjustment_price: None,
        is_latest: true,
    };

    let upcoming = UpcomingBillItem {
        order_id: bill_item.order_id.clone(),
        product_id: bill_item.product_id.clone(),
        student_product_id: bill_item.student_product_id.clone(),
        billing_schedule_period_id: period.id.clone(),
        billing_date: period.billing_date,
        product_description: bill_item.product_description.clone(),
        discount_id: bill_item.discount.as_ref().map(|d| d.discount_id.clone()),
        tax_id: bill_item.tax.as_ref().map(|t| t.tax_id.clone()),
        is_generated: false,
        execute_note: None,
    };

    Ok(GeneratedBillItem {
        bill_item,
        upcoming,
    })
}

fn discounted(price: Decimal, discount: Option<&BilledDiscount>) -> Result<Decimal, PricingError> {
    discount.map_or(Ok(price), |discount| {
        price
            .checked_sub(discount.discount_amount)
            .ok_or(PricingError::Overflow)
    })
}

/// Price inputs for one period touched by a discount update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRepricing {
    pub period: BillingSchedulePeriod,

    /// Bill item already issued for the period.
    pub previous: BillItem,

    /// Price of the student's tier for the period.
    pub price: Decimal,

    /// Ratio billed from the effective date, when the period is split by it.
    pub ratio: Option<BillingRatio>,

    /// Tax of the previous bill item.
    pub tax: Option<Tax>,
}

/// A drafted bill item of an update order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftBillItem {
    pub product_id: ProductId,
    pub student_product_id: StudentProductId,
    pub billing_schedule_period_id: BillingSchedulePeriodId,
    pub price: Decimal,
    pub billing_ratio: BillingRatio,
    pub discount: Option<BilledDiscount>,
    pub tax: Option<BilledTax>,
    pub final_price: Decimal,
    pub adjustment_price: Decimal,
}

/// Bill items of an update order, split by whether they are billed now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountDraft {
    pub bill_items: Vec<DraftBillItem>,
    pub upcoming_bill_items: Vec<DraftBillItem>,
}

/// Periods a discount update touches: those intersecting the effective date
/// through the student product end date.
pub fn affected_periods<'a>(
    update: &'a UpdateProductDiscount,
    periods: &'a [BillingSchedulePeriod],
) -> impl Iterator<Item = &'a BillingSchedulePeriod> {
    periods
        .iter()
        .filter(|period| !period.is_outside(update.effective_date, update.student_product_end_date))
}

/// Whether the effective date prorates `period` for `product`.
#[must_use]
pub fn needs_proration(
    product: &BillableProduct,
    period: &BillingSchedulePeriod,
    effective_date: Date,
) -> bool {
    !product.disable_pro_rating && period.splits_at(effective_date)
}

/// Re-price each touched period with the new discount.
///
/// # Errors
///
/// - [`DraftError::NoBillItems`]: no period was given.
/// - [`DraftError::Pricing`]: a price calculation overflowed.
pub fn draft_discount_update(
    update: &UpdateProductDiscount,
    periods: &[PeriodRepricing],
    today: Date,
) -> Result<DiscountDraft, DraftError> {
    if periods.is_empty() {
        return Err(DraftError::NoBillItems(update.student_product_id.clone()));
    }

    let mut draft = DiscountDraft::default();

    for repricing in periods {
        let item = draft_period(update, repricing)?;

        if repricing.period.billing_date > today {
            draft.upcoming_bill_items.push(item);
        } else {
            draft.bill_items.push(item);
        }
    }

    Ok(draft)
}

fn draft_period(
    update: &UpdateProductDiscount,
    repricing: &PeriodRepricing,
) -> Result<DraftBillItem, PricingError> {
    let ratio = repricing.ratio.unwrap_or(BillingRatio::WHOLE);
    let price = ratio.apply(repricing.price)?;

    let discount = match (update.discount_id.clone(), update.discount_amount()) {
        (Some(discount_id), Some(amount)) => {
            Some(BilledDiscount::on_price(discount_id, None, amount, price)?)
        }
        _ => None,
    };

    let final_price = discounted(price, discount.as_ref())?;

    let tax = repricing
        .tax
        .as_ref()
        .map(|tax| BilledTax::on_amount(tax, final_price))
        .transpose()?;

    let new_whole = match update.discount_amount() {
        Some(amount) => subtract(repricing.price, amount.amount_on(repricing.price)?)?,
        None => repricing.price,
    };

    let previous = &repricing.previous.line;

    let old_whole = match &previous.discount {
        Some(discount) => subtract(previous.price, discount.amount.amount_on(previous.price)?)?,
        None => previous.price,
    };

    Ok(DraftBillItem {
        product_id: update.product_id.clone(),
        student_product_id: update.student_product_id.clone(),
        billing_schedule_period_id: repricing.period.id.clone(),
        price,
        billing_ratio: ratio,
        discount,
        tax,
        final_price,
        adjustment_price: adjustment_price(new_whole, old_whole, ratio)?,
    })
}

fn subtract(amount: Decimal, less: Decimal) -> Result<Decimal, PricingError> {
    amount.checked_sub(less).ok_or(PricingError::Overflow)
}


#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::{
        fixtures::{bill_item, period},
        *,
    };
    use crate::{discounts::fixtures::discount, lifecycle::DiscountType};

    fn tax() -> Tax {
        Tax {
            id: "tax-1".into(),
            name: "Consumption tax".to_string(),
            percentage: dec!(10),
            category: TaxCategory::Inclusive,
        }
    }

    fn price(price_type: ProductPriceType, price: Decimal) -> ProductPrice {
        ProductPrice {
            product_id: "product-1".into(),
            billing_schedule_period_id: None,
            price_type,
            price,
        }
    }

    #[test]
    fn enrolled_students_get_the_enrolled_tier() {
        let prices = [
            price(ProductPriceType::Default, dec!(1000)),
            price(ProductPriceType::Enrolled, dec!(800)),
        ];

        assert_eq!(price_for(&prices, true).map(|p| p.price), Some(dec!(800)));
        assert_eq!(price_for(&prices, false).map(|p| p.price), Some(dec!(1000)));
    }

    #[test]
    fn missing_enrolled_tier_falls_back_to_default() {
        let prices = [price(ProductPriceType::Default, dec!(1000))];

        assert_eq!(price_for(&prices, true).map(|p| p.price), Some(dec!(1000)));
    }

    #[test]
    fn last_period_is_detected_by_id() {
        let march = period("p-3", date(2024, 3, 1), date(2024, 3, 31), date(2024, 2, 25));

        assert!(is_last_period(&march, &march.clone()));
    }

    #[test]
    fn next_item_bills_whole_period_with_rounded_discount() -> TestResult {
        let february = period("p-2", date(2024, 2, 1), date(2024, 2, 29), date(2024, 1, 25));
        let march = period("p-3", date(2024, 3, 1), date(2024, 3, 31), date(2024, 2, 25));
        let latest = bill_item(&february, dec!(10_005));
        let sibling = discount("d-1", DiscountAmount::Percentage(dec!(5)));
        let tax = tax();

        let generated = next_bill_item(NextBillItem {
            latest: &latest,
            period: &march,
            price: dec!(10_005),
            discount: Some(&sibling),
            tax: Some(&tax),
            today: date(2024, 2, 10),
        })?;

        let item = &generated.bill_item;
        let billed = item.discount.clone().ok_or("missing discount")?;

        assert_eq!(billed.raw_discount_amount, dec!(500.25));
        assert_eq!(billed.discount_amount, dec!(500));
        assert_eq!(item.final_price, dec!(9505));
        assert_eq!(item.billing_ratio, None);
        assert_eq!(item.billing_status, BillingStatus::Pending);
        assert_eq!(item.billing_type, BillingType::UpcomingBilling);
        assert_eq!(item.billing_date, date(2024, 2, 25));
        assert_eq!(item.tax.as_ref().map(|t| t.tax_amount), Some(dec!(9505) * dec!(10) / dec!(110)));

        assert_eq!(generated.upcoming.billing_schedule_period_id, march.id);
        assert!(!generated.upcoming.is_generated);
        assert_eq!(generated.upcoming.execute_note, None);

        Ok(())
    }

    #[test]
    fn overdue_periods_are_billed_today() -> TestResult {
        let february = period("p-2", date(2024, 2, 1), date(2024, 2, 29), date(2024, 1, 25));
        let march = period("p-3", date(2024, 3, 1), date(2024, 3, 31), date(2024, 2, 25));
        let latest = bill_item(&february, dec!(1000));

        let generated = next_bill_item(NextBillItem {
            latest: &latest,
            period: &march,
            price: dec!(1000),
            discount: None,
            tax: None,
            today: date(2024, 3, 2),
        })?;

        assert_eq!(generated.bill_item.billing_status, BillingStatus::Billed);
        assert_eq!(generated.bill_item.billing_date, date(2024, 3, 2));
        assert_eq!(generated.bill_item.final_price, dec!(1000));

        Ok(())
    }

    fn update(discount_value: Option<Decimal>) -> UpdateProductDiscount {
        UpdateProductDiscount {
            student_id: "student-1".into(),
            location_id: "location-1".into(),
            product_id: "product-1".into(),
            student_product_id: "sp-1".into(),
            effective_date: date(2024, 2, 16),
            student_product_end_date: date(2024, 12, 31),
            discount_id: discount_value.map(|_| "d-1".into()),
            discount_type: discount_value.map(|_| DiscountType::Sibling),
            discount_amount_type: discount_value
                .map(|_| crate::lifecycle::DiscountAmountType::Percentage),
            discount_amount_value: discount_value.unwrap_or_default(),
        }
    }

    #[test]
    fn affected_periods_intersect_the_update_window() {
        let periods = [
            period("p-1", date(2024, 1, 1), date(2024, 1, 31), date(2023, 12, 25)),
            period("p-2", date(2024, 2, 1), date(2024, 2, 29), date(2024, 1, 25)),
            period("p-3", date(2024, 3, 1), date(2024, 3, 31), date(2024, 2, 25)),
        ];

        let update = update(Some(dec!(10)));

        let ids: Vec<_> = affected_periods(&update, &periods)
            .map(|p| p.id.as_str())
            .collect();

        assert_eq!(ids, vec!["p-2", "p-3"]);
    }

    #[test]
    fn proration_only_when_effective_date_splits_the_period() {
        let february = period("p-2", date(2024, 2, 1), date(2024, 2, 29), date(2024, 1, 25));
        let mut product = BillableProduct {
            id: "product-1".into(),
            name: "Monthly tuition".to_string(),
            billing_schedule_id: Some("schedule-1".into()),
            disable_pro_rating: false,
        };

        assert!(needs_proration(&product, &february, date(2024, 2, 16)));
        assert!(!needs_proration(&product, &february, date(2024, 2, 1)));

        product.disable_pro_rating = true;
        assert!(!needs_proration(&product, &february, date(2024, 2, 16)));
    }

    #[test]
    fn draft_prorates_discounts_and_adjusts_against_previous_item() -> TestResult {
        let february = period("p-2", date(2024, 2, 1), date(2024, 2, 29), date(2024, 1, 25));
        let march = period("p-3", date(2024, 3, 1), date(2024, 3, 31), date(2024, 2, 25));

        let periods = [
            PeriodRepricing {
                previous: bill_item(&february, dec!(1000)),
                period: february,
                price: dec!(1000),
                ratio: Some(BillingRatio::new(1, 2)?),
                tax: Some(tax()),
            },
            PeriodRepricing {
                previous: bill_item(&march, dec!(1000)),
                period: march,
                price: dec!(1000),
                ratio: None,
                tax: None,
            },
        ];

        let draft = draft_discount_update(&update(Some(dec!(10))), &periods, date(2024, 2, 16))?;

        let [billed] = draft.bill_items.as_slice() else {
            panic!("expected one bill item, got {:?}", draft.bill_items);
        };

        assert_eq!(billed.price, dec!(500));
        assert_eq!(billed.final_price, dec!(450));
        assert_eq!(billed.adjustment_price, dec!(-50));
        assert_eq!(billed.tax.as_ref().map(|t| t.tax_amount), Some(dec!(450) * dec!(10) / dec!(110)));

        let [upcoming] = draft.upcoming_bill_items.as_slice() else {
            panic!("expected one upcoming item, got {:?}", draft.upcoming_bill_items);
        };

        assert_eq!(upcoming.billing_ratio, BillingRatio::WHOLE);
        assert_eq!(upcoming.final_price, dec!(900));
        assert_eq!(upcoming.adjustment_price, dec!(-100));

        Ok(())
    }

    #[test]
    fn removing_a_discount_restores_the_price() -> TestResult {
        let march = period("p-3", date(2024, 3, 1), date(2024, 3, 31), date(2024, 2, 25));

        let mut previous = bill_item(&march, dec!(1000));
        previous.line.discount = Some(BilledDiscount::on_price(
            "d-1".into(),
            None,
            DiscountAmount::Fixed(dec!(200)),
            dec!(1000),
        )?);

        let periods = [PeriodRepricing {
            previous,
            period: march,
            price: dec!(1000),
            ratio: None,
            tax: None,
        }];

        let draft = draft_discount_update(&update(None), &periods, date(2024, 2, 16))?;

        let upcoming = draft.upcoming_bill_items.first().ok_or("missing upcoming item")?;

        assert_eq!(upcoming.discount, None);
        assert_eq!(upcoming.final_price, dec!(1000));
        assert_eq!(upcoming.adjustment_price, dec!(200));

        Ok(())
    }

    #[test]
    fn draft_without_periods_fails() {
        let result = draft_discount_update(&update(Some(dec!(10))), &[], date(2024, 2, 16));

        assert_eq!(result, Err(DraftError::NoBillItems("sp-1".into())));
    }
}
