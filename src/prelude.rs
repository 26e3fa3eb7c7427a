//! Bursar prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    billing::{
        BillItem, BillLine, BillableProduct, BilledDiscount, BilledTax, BillingSchedulePeriod,
        DiscountDraft, DraftBillItem, DraftError, GeneratedBillItem, NextBillItem,
        PeriodRepricing, ProductPrice, Tax, UpcomingBillItem, affected_periods,
        draft_discount_update, is_last_period, needs_proration, next_bill_item, price_for,
    },
    discounts::{
        Discount, DiscountDecision, UpdateProductDiscount, decide, highest_percentage,
        highest_product_discount, select_highest,
    },
    ids::*,
    lifecycle::{
        BillingStatus, BillingType, DiscountAmountType, DiscountType, LifecycleError,
        OrderStatus, OrderType, ProductPriceType, StudentProductLabel, StudentProductStatus,
        TaxCategory, TrackingAction,
    },
    pricing::{BillingRatio, DiscountAmount, PricingError},
    segments::{SegmentError, TimestampSegment, coalesce, overlap},
    students::{BillingSkip, StudentProduct},
    tags::{NewUserDiscountTag, TagPlan, plan_sibling_tags},
    tracking::{
        NewDiscountTracker, ProductGroup, StudentDiscountTracker, plan_tracking,
        tracked_segments,
    },
};
