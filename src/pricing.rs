//! Pricing
//!
//! Money arithmetic for bill items. Amounts are [`Decimal`]s in the
//! organization's currency; every operation is checked and surfaces
//! [`PricingError::Overflow`] instead of wrapping.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::{DiscountAmountType, TaxCategory};

/// Errors raised by price calculations.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PricingError {
    /// A billing ratio with a zero denominator.
    #[error("billing ratio denominator cannot be zero")]
    ZeroDenominator,

    /// A billing ratio larger than one whole period.
    #[error("billing ratio {numerator}/{denominator} exceeds a whole period")]
    RatioAboveWhole {
        /// Ratio numerator.
        numerator: u32,

        /// Ratio denominator.
        denominator: u32,
    },

    /// Arithmetic overflowed the decimal range.
    #[error("price calculation overflowed")]
    Overflow,
}

/// Share of a billing period that is actually billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingRatio {
    numerator: u32,
    denominator: u32,
}

impl BillingRatio {
    /// A whole period.
    pub const WHOLE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    /// Create a ratio.
    ///
    /// # Errors
    ///
    /// - [`PricingError::ZeroDenominator`]: `denominator` is zero.
    /// - [`PricingError::RatioAboveWhole`]: `numerator` is larger than `denominator`.
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, PricingError> {
        if denominator == 0 {
            return Err(PricingError::ZeroDenominator);
        }

        if numerator > denominator {
            return Err(PricingError::RatioAboveWhole {
                numerator,
                denominator,
            });
        }

        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Ratio numerator.
    #[must_use]
    pub const fn numerator(self) -> u32 {
        self.numerator
    }

    /// Ratio denominator.
    #[must_use]
    pub const fn denominator(self) -> u32 {
        self.denominator
    }

    /// Whether the ratio bills the whole period.
    #[must_use]
    pub const fn is_whole(self) -> bool {
        self.numerator == self.denominator
    }

    /// Scale `amount` by the ratio.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the product does not fit.
    pub fn apply(self, amount: Decimal) -> Result<Decimal, PricingError> {
        amount
            .checked_mul(Decimal::from(self.numerator))
            .and_then(|scaled| scaled.checked_div(Decimal::from(self.denominator)))
            .ok_or(PricingError::Overflow)
    }
}

/// A discount expressed in its configured amount type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountAmount {
    /// Percentage points of the price.
    Percentage(Decimal),

    /// Flat amount off.
    Fixed(Decimal),
}

impl DiscountAmount {
    /// Build from the stored amount type and value.
    #[must_use]
    pub const fn from_parts(amount_type: DiscountAmountType, value: Decimal) -> Self {
        match amount_type {
            DiscountAmountType::Percentage => Self::Percentage(value),
            DiscountAmountType::FixedAmount => Self::Fixed(value),
        }
    }

    /// Stored amount type.
    #[must_use]
    pub const fn amount_type(self) -> DiscountAmountType {
        match self {
            Self::Percentage(_) => DiscountAmountType::Percentage,
            Self::Fixed(_) => DiscountAmountType::FixedAmount,
        }
    }

    /// Stored amount value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        match self {
            Self::Percentage(value) | Self::Fixed(value) => value,
        }
    }

    /// Unrounded discount on `price`.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the calculation does not fit.
    pub fn amount_on(self, price: Decimal) -> Result<Decimal, PricingError> {
        match self {
            Self::Percentage(percent) => percent_of(price, percent),
            Self::Fixed(amount) => Ok(amount),
        }
    }
}

/// `percent` percent of `amount`.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the calculation does not fit.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Result<Decimal, PricingError> {
    amount
        .checked_mul(percent)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(PricingError::Overflow)
}

/// Tax contained in, or added to, `amount` for a tax of `percent` percent.
///
/// Inclusive taxes are already part of the amount and are extracted as
/// `amount * percent / (100 + percent)`.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the calculation does not fit.
pub fn tax_amount(
    amount: Decimal,
    percent: Decimal,
    category: TaxCategory,
) -> Result<Decimal, PricingError> {
    match category {
        TaxCategory::Inclusive => amount
            .checked_mul(percent)
            .and_then(|scaled| {
                Decimal::ONE_HUNDRED
                    .checked_add(percent)
                    .and_then(|base| scaled.checked_div(base))
            })
            .ok_or(PricingError::Overflow),
        TaxCategory::Exclusive => percent_of(amount, percent),
    }
}

/// Round to whole currency units, half away from zero.
#[must_use]
pub fn round_to_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Difference between the new and old discounted price, scaled by the billed ratio.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the calculation does not fit.
pub fn adjustment_price(
    new_price: Decimal,
    old_price: Decimal,
    ratio: BillingRatio,
) -> Result<Decimal, PricingError> {
    let difference = new_price
        .checked_sub(old_price)
        .ok_or(PricingError::Overflow)?;

    ratio.apply(difference)
}
