//! Discounts
//!
//! Master-data discounts, the choice of the single highest discount for a
//! student product, and the [`UpdateProductDiscount`] event that carries a
//! change of discount to the order service.

use std::cmp::Reverse;

use jiff::{Timestamp, civil::Date};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{DiscountId, DiscountTagId, LocationId, ProductId, StudentId, StudentProductId},
    lifecycle::{DiscountAmountType, DiscountType, StudentProductLabel},
    pricing::DiscountAmount,
    students::StudentProduct,
};

/// A discount master-data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub name: String,
    pub discount_type: DiscountType,
    pub amount: DiscountAmount,

    /// Tag linking the discount to tag-based eligibility.
    pub discount_tag_id: Option<DiscountTagId>,

    pub available_from: Timestamp,
    pub available_until: Timestamp,

    /// Number of bill items the discount may be carried on, when limited.
    pub recurring_valid_duration: Option<u32>,
}

impl Discount {
    /// Whether `at` falls inside the availability window.
    #[must_use]
    pub fn is_available_at(&self, at: Timestamp) -> bool {
        self.available_from <= at && at <= self.available_until
    }

    /// Whether the discount may be carried onto one more bill item.
    ///
    /// `carried` is the number of bill items that already carry it.
    #[must_use]
    pub fn still_applies(&self, carried: usize, at: Timestamp) -> bool {
        if !self.is_available_at(at) {
            return false;
        }

        self.recurring_valid_duration
            .is_none_or(|limit| carried < usize::try_from(limit).unwrap_or(usize::MAX))
    }

    fn rank(&self) -> (bool, Decimal, Reverse<&DiscountId>) {
        (
            self.amount.amount_type() == DiscountAmountType::Percentage,
            self.amount.value(),
            Reverse(&self.id),
        )
    }
}

/// Highest percentage discount among tag-based candidates.
pub fn highest_percentage<'a, I>(candidates: I) -> Option<&'a Discount>
where
    I: IntoIterator<Item = &'a Discount>,
{
    candidates
        .into_iter()
        .filter(|discount| matches!(discount.amount, DiscountAmount::Percentage(_)))
        .max_by(|a, b| a.rank().cmp(&b.rank()))
}

/// Highest product-level discount: percentage before fixed amount, then by value.
pub fn highest_product_discount<'a, I>(candidates: I) -> Option<&'a Discount>
where
    I: IntoIterator<Item = &'a Discount>,
{
    candidates.into_iter().max_by(|a, b| a.rank().cmp(&b.rank()))
}

/// The single discount to apply: tag-based first, product-level as fallback.
///
/// Ties resolve to the lowest discount ID.
#[must_use]
pub fn select_highest<'a>(
    tag_based: &'a [Discount],
    product_level: &'a [Discount],
) -> Option<&'a Discount> {
    highest_percentage(tag_based).or_else(|| highest_product_discount(product_level))
}

/// A change of discount for one student product.
///
/// A removal carries no discount ID, type or amount type and a zero value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductDiscount {
    pub student_id: StudentId,
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub student_product_id: StudentProductId,
    pub effective_date: Date,
    pub student_product_end_date: Date,
    pub discount_id: Option<DiscountId>,
    pub discount_type: Option<DiscountType>,
    pub discount_amount_type: Option<DiscountAmountType>,
    #[serde(default)]
    pub discount_amount_value: Decimal,
}

impl UpdateProductDiscount {
    /// Event applying `discount` (or removing the current one) from `today`,
    /// or from the product start when that is later.
    #[must_use]
    pub fn for_product(product: &StudentProduct, discount: Option<&Discount>, today: Date) -> Self {
        Self {
            student_id: product.student_id.clone(),
            location_id: product.location_id.clone(),
            product_id: product.product_id.clone(),
            student_product_id: product.id.clone(),
            effective_date: today.max(product.start_date),
            student_product_end_date: product.end_date,
            discount_id: discount.map(|d| d.id.clone()),
            discount_type: discount.map(|d| d.discount_type),
            discount_amount_type: discount.map(|d| d.amount.amount_type()),
            discount_amount_value: discount.map_or(Decimal::ZERO, |d| d.amount.value()),
        }
    }

    /// Whether the event removes the discount.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.discount_id.is_none()
    }

    /// Discount amount carried by the event.
    #[must_use]
    pub fn discount_amount(&self) -> Option<DiscountAmount> {
        self.discount_amount_type
            .map(|amount_type| DiscountAmount::from_parts(amount_type, self.discount_amount_value))
    }
}

/// What the highest-discount selector does for one student product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountDecision {
    /// The billed discount is already the highest one.
    Unchanged,

    /// Publish the update.
    Apply(UpdateProductDiscount),

    /// A scheduled change blocks the update; notify staff instead.
    Defer {
        /// Label that blocked the update.
        label: StudentProductLabel,

        /// Update that would have been published.
        update: UpdateProductDiscount,
    },
}

/// Compare the selected discount with the one currently billed.
#[must_use]
pub fn decide(
    product: &StudentProduct,
    selected: Option<&Discount>,
    billed: Option<&DiscountId>,
    today: Date,
) -> DiscountDecision {
    if selected.map(|discount| &discount.id) == billed {
        return DiscountDecision::Unchanged;
    }

    let update = UpdateProductDiscount::for_product(product, selected, today);

    if product.label.is_scheduled_change() {
        return DiscountDecision::Defer {
            label: product.label,
            update,
        };
    }

    DiscountDecision::Apply(update)
}
