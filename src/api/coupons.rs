//! Coupon validation endpoint (read-only; no usage is counted here).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::{tag_request_id, AppState};
use crate::error::{AppError, DomainError};
use crate::orders::coupons::DiscountType;
use crate::services::pricing::apply_coupon;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub discount: i64,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub message: String,
}

/// POST /api/coupons/validate
pub async fn validate_coupon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, AppError> {
    if body.code.trim().is_empty() || body.subtotal < 0 {
        return Err(tag_request_id(
            AppError::missing_field("code"),
            &headers,
        ));
    }

    let coupon = state
        .coupons
        .find_by_code(&body.code)
        .await
        .map_err(|e| tag_request_id(e.into(), &headers))?
        .ok_or_else(|| {
            tag_request_id(
                AppError::domain(DomainError::CouponRejected {
                    reason: "Invalid coupon code".to_string(),
                }),
                &headers,
            )
        })?;

    let discount = apply_coupon(&coupon, body.subtotal, Utc::now()).map_err(|rejection| {
        tag_request_id(
            AppError::domain(DomainError::CouponRejected {
                reason: rejection.user_message(),
            }),
            &headers,
        )
    })?;

    Ok(Json(ValidateCouponResponse {
        valid: true,
        discount,
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        message: format!("Coupon applied! You saved Rs{}", discount),
    }))
}
