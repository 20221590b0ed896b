//! Order pricing: subtotal, coupon discount, shipping, total.
//!
//! All amounts are whole rupees. The computed quote is frozen onto the order
//! at creation and never recomputed afterwards.

use chrono::{DateTime, Utc};

use crate::orders::coupons::{Coupon, DiscountType};
use crate::orders::model::OrderItem;

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub free_shipping_threshold: i64,
    pub shipping_fee: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 3000,
            shipping_fee: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_cost: i64,
    pub total: i64,
}

/// Why a coupon cannot be applied. Messages are user-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    Inactive,
    Expired,
    UsageLimitReached,
    BelowMinimum { minimum: i64 },
}

impl CouponRejection {
    pub fn user_message(&self) -> String {
        match self {
            CouponRejection::Inactive => "This coupon is no longer active".to_string(),
            CouponRejection::Expired => "This coupon has expired".to_string(),
            CouponRejection::UsageLimitReached => {
                "This coupon has reached its usage limit".to_string()
            }
            CouponRejection::BelowMinimum { minimum } => {
                format!("Minimum order amount of Rs{} required", minimum)
            }
        }
    }
}

pub fn subtotal_of(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .map(|item| item.price * i64::from(item.quantity))
        .sum()
}

pub fn shipping_cost(subtotal: i64, config: &PricingConfig) -> i64 {
    if subtotal >= config.free_shipping_threshold {
        0
    } else {
        config.shipping_fee
    }
}

/// Compute the discount a coupon yields on a subtotal, or the reason it is
/// rejected. The discount never exceeds the subtotal.
pub fn apply_coupon(
    coupon: &Coupon,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<i64, CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if let Some(expires_at) = coupon.expires_at {
        if expires_at < now {
            return Err(CouponRejection::Expired);
        }
    }
    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(CouponRejection::UsageLimitReached);
        }
    }
    if let Some(minimum) = coupon.minimum_order_amount {
        if subtotal < minimum {
            return Err(CouponRejection::BelowMinimum { minimum });
        }
    }

    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            // Round-half-up on whole rupees.
            let raw = (subtotal * coupon.discount_value + 50) / 100;
            match coupon.max_discount_amount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    };

    Ok(discount.clamp(0, subtotal))
}

pub fn quote(subtotal: i64, discount: i64, config: &PricingConfig) -> Quote {
    let shipping_cost = shipping_cost(subtotal, config);
    Quote {
        subtotal,
        discount,
        shipping_cost,
        total: subtotal - discount + shipping_cost,
    }
}
