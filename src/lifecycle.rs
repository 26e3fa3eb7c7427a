//! Lifecycle States
//!
//! Orders, student products and bill items move through a small number of
//! states that are exchanged with other services as upper-case wire strings
//! (`ORDER_TYPE_NEW`, `ORDERED`, ...). They are modelled here as closed enums
//! so every branch on them is checked for exhaustiveness.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use thiserror::Error;

/// Errors raised while decoding lifecycle states.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The wire string does not name a known state.
    #[error("unknown {kind} value `{value}`")]
    Unknown {
        /// Name of the state enum.
        kind: &'static str,

        /// Offending wire value.
        value: String,
    },
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every state, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = LifecycleError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(LifecycleError::Unknown {
                        kind: stringify!($name),
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;

                raw.parse().map_err(D::Error::custom)
            }
        }
    };
}

wire_enum! {
    /// Kind of order that produced an event.
    OrderType {
        /// First purchase of a product.
        New => "ORDER_TYPE_NEW",
        /// Enrollment into the organization.
        Enrollment => "ORDER_TYPE_ENROLLMENT",
        /// Change to an existing student product.
        Update => "ORDER_TYPE_UPDATE",
        /// Student leaves the organization.
        Withdrawal => "ORDER_TYPE_WITHDRAWAL",
        /// Student graduates.
        Graduate => "ORDER_TYPE_GRADUATE",
        /// Leave of absence.
        LeaveOfAbsence => "ORDER_TYPE_LOA",
        /// Product is paused.
        Pause => "ORDER_TYPE_PAUSE",
        /// Paused or absent student resumes.
        Resume => "ORDER_TYPE_RESUME",
        /// Manually billed order with no product lifecycle.
        CustomBilling => "ORDER_TYPE_CUSTOM_BILLING",
    }
}

wire_enum! {
    /// Status of an order.
    OrderStatus {
        /// Submitted and effective.
        Submitted => "ORDER_STATUS_SUBMITTED",
        /// Awaiting approval.
        Pending => "ORDER_STATUS_PENDING",
        /// Rejected during approval.
        Rejected => "ORDER_STATUS_REJECTED",
        /// Voided after submission.
        Voided => "ORDER_STATUS_VOIDED",
        /// Invoiced.
        Invoiced => "ORDER_STATUS_INVOICED",
    }
}

wire_enum! {
    /// Status of a student product.
    StudentProductStatus {
        /// Ordered and live.
        Ordered => "ORDERED",
        /// Waiting on an approval.
        Pending => "PENDING",
        /// Cancelled (withdrawn, graduated or voided).
        Cancelled => "CANCELLED",
    }
}

wire_enum! {
    /// Scheduling label of a student product.
    StudentProductLabel {
        /// Freshly created.
        Created => "CREATED",
        /// Superseded by an update.
        Updated => "UPDATED",
        /// An update is scheduled for a future date.
        UpdateScheduled => "UPDATE_SCHEDULED",
        /// A withdrawal is scheduled for a future date.
        WithdrawalScheduled => "WITHDRAWAL_SCHEDULED",
        /// A graduation is scheduled for a future date.
        GraduationScheduled => "GRADUATION_SCHEDULED",
        /// A pause is scheduled for a future date.
        PauseScheduled => "PAUSE_SCHEDULED",
        /// Paused.
        Paused => "PAUSED",
    }
}

wire_enum! {
    /// Status of a bill item.
    BillingStatus {
        /// Generated ahead of its bill date.
        Pending => "BILLING_STATUS_PENDING",
        /// Waiting for an approval.
        WaitingApproval => "BILLING_STATUS_WAITING_APPROVAL",
        /// Billed.
        Billed => "BILLING_STATUS_BILLED",
        /// Included in an invoice.
        Invoiced => "BILLING_STATUS_INVOICED",
        /// Cancelled or voided.
        Cancelled => "BILLING_STATUS_CANCELLED",
    }
}

wire_enum! {
    /// When a bill item was billed.
    BillingType {
        /// Billed together with its order.
        BilledAtOrder => "BILLING_TYPE_BILLED_AT_ORDER",
        /// Generated ahead of its period by the recurring generator.
        UpcomingBilling => "BILLING_TYPE_UPCOMING_BILLING",
    }
}

wire_enum! {
    /// Price tier of a product price row.
    ProductPriceType {
        /// Price for students not enrolled in the organization.
        Default => "DEFAULT_PRICE",
        /// Price for students enrolled in the organization.
        Enrolled => "ENROLLED_PRICE",
    }
}

wire_enum! {
    /// Kind of discount.
    DiscountType {
        /// Plain discount configured per product.
        Regular => "DISCOUNT_TYPE_REGULAR",
        /// Granted for owning a combination of products.
        Combo => "DISCOUNT_TYPE_COMBO",
        /// Granted while a sibling owns an eligible product.
        Sibling => "DISCOUNT_TYPE_SIBLING",
        /// Granted to families.
        Family => "DISCOUNT_TYPE_FAMILY",
        /// Granted to single-parent households.
        SingleParent => "DISCOUNT_TYPE_SINGLE_PARENT",
        /// Granted to employees' children.
        EmployeeFullTime => "DISCOUNT_TYPE_EMPLOYEE_FULL_TIME",
    }
}

wire_enum! {
    /// How a discount amount is expressed.
    DiscountAmountType {
        /// Percentage of the price.
        Percentage => "DISCOUNT_AMOUNT_TYPE_PERCENTAGE",
        /// Flat amount off.
        FixedAmount => "DISCOUNT_AMOUNT_TYPE_FIXED_AMOUNT",
    }
}

wire_enum! {
    /// Tax calculation category.
    TaxCategory {
        /// Price already includes tax.
        Inclusive => "TAX_CATEGORY_INCLUSIVE",
        /// Tax is added on top of the price.
        Exclusive => "TAX_CATEGORY_EXCLUSIVE",
    }
}

/// What the discount tracker must do for one student product of an order event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingAction {
    /// Nothing to track.
    Ignore,

    /// Start tracking the student product.
    Track,

    /// Revise the prior version's duration, then track the new version.
    ReviseAndTrack,

    /// Revise the prior version's duration only.
    Revise,

    /// The order was voided; shrink the duration of its student products.
    Void,
}

impl TrackingAction {
    /// Whether the action creates new tracker rows.
    #[must_use]
    pub const fn tracks(self) -> bool {
        matches!(self, Self::Track | Self::ReviseAndTrack)
    }

    /// Whether the action revises the tracker rows of the prior version.
    ///
    /// A void works on the voided order's own student products instead.
    #[must_use]
    pub const fn revises(self) -> bool {
        matches!(self, Self::Revise | Self::ReviseAndTrack)
    }
}

impl OrderType {
    /// Tracker transition for an order of this type in the given status.
    #[must_use]
    pub const fn tracking_action(self, status: OrderStatus) -> TrackingAction {
        match status {
            OrderStatus::Voided => TrackingAction::Void,
            OrderStatus::Pending | OrderStatus::Rejected => TrackingAction::Ignore,
            OrderStatus::Submitted | OrderStatus::Invoiced => match self {
                Self::New | Self::Enrollment | Self::Resume => TrackingAction::Track,
                Self::Update => TrackingAction::ReviseAndTrack,
                Self::Withdrawal | Self::Graduate | Self::LeaveOfAbsence | Self::Pause => {
                    TrackingAction::Revise
                }
                Self::CustomBilling => TrackingAction::Ignore,
            },
        }
    }
}

impl BillingStatus {
    /// Status of a generated bill item: pending until its bill date arrives.
    #[must_use]
    pub const fn for_generated(upcoming: bool) -> Self {
        if upcoming { Self::Pending } else { Self::Billed }
    }
}

impl BillingType {
    /// Type of a generated bill item.
    #[must_use]
    pub const fn for_generated(upcoming: bool) -> Self {
        if upcoming {
            Self::UpcomingBilling
        } else {
            Self::BilledAtOrder
        }
    }
}

impl DiscountType {
    /// Whether trackers are kept for products in groups of this type.
    #[must_use]
    pub const fn is_tracked(self) -> bool {
        matches!(self, Self::Sibling | Self::Combo)
    }
}

impl StudentProductLabel {
    /// Whether a future change is already scheduled for the student product.
    #[must_use]
    pub const fn is_scheduled_change(self) -> bool {
        match self {
            Self::UpdateScheduled
            | Self::WithdrawalScheduled
            | Self::GraduationScheduled
            | Self::PauseScheduled => true,
            Self::Created | Self::Updated | Self::Paused => false,
        }
    }
}
