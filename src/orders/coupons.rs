//! Coupon records and redemption.
//!
//! Redemption is an atomic increment-with-limit-check: the usage-limit
//! comparison lives inside the conditional update itself, so concurrent
//! checkouts cannot both increment past `usage_limit` from the same base
//! count.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::orders::store::StoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent (0..=100) for percentage coupons, whole rupees for fixed.
    pub discount_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_order_amount: Option<i64>,
    /// Cap for percentage discounts, whole rupees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Look a coupon up by code, case-insensitively. Returns inactive and
    /// expired coupons too; the pricing layer decides rejection so the
    /// caller can report a precise reason.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Count one use against the coupon. Returns `false` when the coupon is
    /// missing, inactive, or already at its usage limit.
    async fn redeem(&self, code: &str) -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct CouponRow {
    code: String,
    discount_type: String,
    discount_value: i64,
    minimum_order_amount: Option<i64>,
    max_discount_amount: Option<i64>,
    usage_limit: Option<i32>,
    used_count: i32,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount_type = match row.discount_type.as_str() {
            "percentage" => DiscountType::Percentage,
            "fixed" => DiscountType::Fixed,
            other => {
                return Err(StoreError::Backend(format!(
                    "unknown discount type: {}",
                    other
                )))
            }
        };
        Ok(Coupon {
            code: row.code,
            discount_type,
            discount_value: row.discount_value,
            minimum_order_amount: row.minimum_order_amount,
            max_discount_amount: row.max_discount_amount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            expires_at: row.expires_at,
            is_active: row.is_active,
        })
    }
}

pub struct PgCouponStore {
    pool: PgPool,
}

impl PgCouponStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT code, discount_type, discount_value, minimum_order_amount, \
                    max_discount_amount, usage_limit, used_count, expires_at, is_active \
             FROM coupons WHERE UPPER(code) = UPPER($1)",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    async fn redeem(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1 \
             WHERE UPPER(code) = UPPER($1) AND is_active \
                 AND (usage_limit IS NULL OR used_count < usage_limit)",
        )
        .bind(code.trim())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryCouponStore {
    coupons: RwLock<HashMap<String, Coupon>>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, coupon: Coupon) {
        self.coupons
            .write()
            .await
            .insert(coupon.code.to_uppercase(), coupon);
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self
            .coupons
            .read()
            .await
            .get(&code.trim().to_uppercase())
            .cloned())
    }

    async fn redeem(&self, code: &str) -> Result<bool, StoreError> {
        let mut coupons = self.coupons.write().await;
        let coupon = match coupons.get_mut(&code.trim().to_uppercase()) {
            Some(coupon) => coupon,
            None => return Ok(false),
        };
        if !coupon.is_active {
            return Ok(false);
        }
        if let Some(limit) = coupon.usage_limit {
            if coupon.used_count >= limit {
                return Ok(false);
            }
        }
        coupon.used_count += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(limit: Option<i32>) -> Coupon {
        Coupon {
            code: "SUMMER10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            minimum_order_amount: None,
            max_discount_amount: None,
            usage_limit: limit,
            used_count: 0,
            expires_at: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store = InMemoryCouponStore::new();
        store.insert(coupon(None)).await;
        let found = store
            .find_by_code("summer10")
            .await
            .expect("lookup should succeed");
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn redeem_stops_at_usage_limit() {
        let store = InMemoryCouponStore::new();
        store.insert(coupon(Some(2))).await;
        assert!(store.redeem("SUMMER10").await.expect("redeem 1"));
        assert!(store.redeem("SUMMER10").await.expect("redeem 2"));
        assert!(!store.redeem("SUMMER10").await.expect("redeem 3"));

        let coupon = store
            .find_by_code("SUMMER10")
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(coupon.used_count, 2);
    }

    #[tokio::test]
    async fn inactive_coupons_cannot_be_redeemed() {
        let store = InMemoryCouponStore::new();
        let mut inactive = coupon(None);
        inactive.is_active = false;
        store.insert(inactive).await;
        assert!(!store.redeem("SUMMER10").await.expect("redeem"));
    }
}
