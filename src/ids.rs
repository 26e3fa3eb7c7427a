//! Typed Identifiers
//!
//! Records in the billing platform are keyed by opaque string identifiers
//! (ULIDs in practice). [`TypedId`] wraps the raw string with a marker type so
//! a student ID can never be passed where a product ID is expected.

use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// String identifier tagged with the record kind it refers to.
pub struct TypedId<T>(String, PhantomData<fn() -> T>);

impl<T> TypedId<T> {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into(), PhantomData)
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the raw identifier.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether the identifier is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T> Clone for TypedId<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone(), PhantomData)
    }
}

impl<T> Debug for TypedId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Debug::fmt(&self.0, f)
    }
}

impl<T> Display for TypedId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl<T> PartialEq for TypedId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for TypedId<T> {}

impl<T> Hash for TypedId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> PartialOrd for TypedId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for TypedId<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Borrow<str> for TypedId<T> {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<T> From<String> for TypedId<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T> From<&str> for TypedId<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T> From<TypedId<T>> for String {
    fn from(value: TypedId<T>) -> Self {
        value.into_string()
    }
}

impl<T> Serialize for TypedId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de, T> Deserialize<'de> for TypedId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Marker types for [`TypedId`].
pub mod kinds {
    macro_rules! kinds {
        ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
            $(
                $(#[$meta])*
                #[derive(Debug)]
                pub enum $name {}
            )*
        };
    }

    kinds! {
        /// A student (also used for siblings).
        Student,
        /// A campus or branch.
        Location,
        /// A sellable product.
        Product,
        /// One purchased product instance for a student.
        StudentProduct,
        /// A product group used for combo/sibling eligibility.
        ProductGroup,
        /// A discount master-data row.
        Discount,
        /// A discount tag linking discounts to tag-based eligibility.
        DiscountTag,
        /// A materialized user discount tag row.
        UserDiscountTag,
        /// A discount tracker row.
        DiscountTracker,
        /// An order.
        Order,
        /// A billing schedule.
        BillingSchedule,
        /// One period of a billing schedule.
        BillingSchedulePeriod,
        /// A tax master-data row.
        Tax,
        /// A staff or service user.
        User,
        /// An organization (tenant / resource path).
        Organization,
    }
}

/// Student ID
pub type StudentId = TypedId<kinds::Student>;
/// Location ID
pub type LocationId = TypedId<kinds::Location>;
/// Product ID
pub type ProductId = TypedId<kinds::Product>;
/// Student Product ID
pub type StudentProductId = TypedId<kinds::StudentProduct>;
/// Product Group ID
pub type ProductGroupId = TypedId<kinds::ProductGroup>;
/// Discount ID
pub type DiscountId = TypedId<kinds::Discount>;
/// Discount Tag ID
pub type DiscountTagId = TypedId<kinds::DiscountTag>;
/// User Discount Tag ID
pub type UserDiscountTagId = TypedId<kinds::UserDiscountTag>;
/// Discount Tracker ID
pub type DiscountTrackerId = TypedId<kinds::DiscountTracker>;
/// Order ID
pub type OrderId = TypedId<kinds::Order>;
/// Billing Schedule ID
pub type BillingScheduleId = TypedId<kinds::BillingSchedule>;
/// Billing Schedule Period ID
pub type BillingSchedulePeriodId = TypedId<kinds::BillingSchedulePeriod>;
/// Tax ID
pub type TaxId = TypedId<kinds::Tax>;
/// User ID
pub type UserId = TypedId<kinds::User>;
/// Organization ID
pub type OrganizationId = TypedId<kinds::Organization>;
