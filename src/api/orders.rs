//! Order endpoints: creation, lookup, admin fulfillment, proof upload.

use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::api::{tag_request_id, AppState};
use crate::error::{AppError, DomainError, ValidationError};
use crate::orders::model::{OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
use crate::orders::store::{FulfillmentPatch, StoreError};
use crate::services::checkout::PlaceOrderRequest;

pub const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub guest_phone: Option<String>,
    /// Convenience alias for guestEmail used by the checkout form.
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notification: Option<String>,
}

/// POST /api/orders — COD, bank transfer, and SafePay pre-payment orders.
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let payment_method = PaymentMethod::from_str(&body.payment_method)
        .map_err(|e| tag_request_id(e, &headers))?;

    let request = PlaceOrderRequest {
        items: body.order_items,
        shipping_address: body.shipping_address,
        payment_method,
        coupon_code: body.coupon_code,
        notes: body.notes,
        user_id: body.user_id,
        guest_name: body.guest_name,
        guest_email: body.guest_email.or(body.email),
        guest_phone: body.guest_phone,
    };

    let placed = state
        .checkout
        .place_order(request)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;
    let admin_notification = state.notifications.admin_alert_link(&placed.order);

    Ok(Json(CreateOrderResponse {
        order_id: placed.order.order_ref,
        status: placed.order.status,
        admin_notification,
    }))
}

/// GET /api/orders/{order_ref}
///
/// Public by design so guests can track orders without an account: anyone
/// holding an order identifier can read the order, shipping address
/// included. Flagged trade-off; identifiers carry 5 chars of entropy.
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_ref): Path<String>,
) -> Result<Json<crate::orders::model::Order>, AppError> {
    let order = state
        .orders
        .find_by_ref(&order_ref)
        .await
        .map_err(|e| tag_request_id(e.into(), &headers))?
        .ok_or_else(|| {
            tag_request_id(
                AppError::domain(DomainError::OrderNotFound {
                    order_ref: order_ref.clone(),
                }),
                &headers,
            )
        })?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateOrderResponse {
    pub success: bool,
    pub status: OrderStatus,
}

/// PATCH /api/orders/{order_ref} — admin only.
///
/// Setting `Delivered` settles payment via the delivery settlement rule.
pub async fn update_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_ref): Path<String>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<Json<UpdateOrderResponse>, AppError> {
    require_admin(&state, &headers)?;

    let status = body
        .status
        .as_deref()
        .map(|raw| {
            OrderStatus::from_db_status(raw).ok_or_else(|| {
                AppError::validation(ValidationError::Invalid {
                    message: format!("unknown order status: {}", raw),
                })
            })
        })
        .transpose()
        .map_err(|e| tag_request_id(e, &headers))?;

    if status.is_none() && body.tracking_number.is_none() {
        return Err(tag_request_id(
            AppError::validation(ValidationError::Invalid {
                message: "nothing to update".to_string(),
            }),
            &headers,
        ));
    }

    let patch = FulfillmentPatch {
        status,
        tracking_number: body.tracking_number,
    };
    let updated = state
        .orders
        .update_fulfillment(&order_ref, patch, Utc::now())
        .await
        .map_err(|e| match e {
            StoreError::NotFound => tag_request_id(
                AppError::domain(DomainError::OrderNotFound {
                    order_ref: order_ref.clone(),
                }),
                &headers,
            ),
            other => tag_request_id(other.into(), &headers),
        })?;

    info!(order_ref = %updated.order_ref, status = %updated.status, "order updated by admin");
    Ok(Json(UpdateOrderResponse {
        success: true,
        status: updated.status,
    }))
}

#[derive(Debug, Serialize)]
pub struct UploadProofResponse {
    pub success: bool,
    pub url: String,
}

/// POST /api/orders/{order_ref}/payment-proof — multipart image upload for
/// bank-transfer evidence. Accepts `image/*` up to 5 MB, stores the file,
/// and parks the order in `Awaiting Payment`.
pub async fn upload_payment_proof(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_ref): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadProofResponse>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tag_request_id(
            AppError::validation(ValidationError::Invalid {
                message: format!("invalid multipart body: {}", e),
            }),
            &headers,
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(tag_request_id(
                AppError::validation(ValidationError::UnsupportedFileType { content_type }),
                &headers,
            ));
        }
        let extension = content_type
            .split('/')
            .nth(1)
            .unwrap_or("bin")
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            tag_request_id(
                AppError::validation(ValidationError::Invalid {
                    message: format!("upload failed: {}", e),
                }),
                &headers,
            )
        })?;
        if data.len() > MAX_PROOF_BYTES {
            return Err(tag_request_id(
                AppError::validation(ValidationError::FileTooLarge {
                    limit_bytes: MAX_PROOF_BYTES,
                }),
                &headers,
            ));
        }
        file = Some((extension, data.to_vec()));
        break;
    }

    let (extension, data) =
        file.ok_or_else(|| tag_request_id(AppError::missing_field("file"), &headers))?;

    // Confirm the order exists before writing anything to disk.
    state
        .orders
        .find_by_ref(&order_ref)
        .await
        .map_err(|e| tag_request_id(e.into(), &headers))?
        .ok_or_else(|| {
            tag_request_id(
                AppError::domain(DomainError::OrderNotFound {
                    order_ref: order_ref.clone(),
                }),
                &headers,
            )
        })?;

    let filename = format!(
        "payment-proof-{}-{}.{}",
        order_ref,
        Utc::now().timestamp_millis(),
        extension
    );
    let dir = state.store.upload_dir.clone();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| tag_request_id(AppError::internal(e.to_string()), &headers))?;
    tokio::fs::write(std::path::Path::new(&dir).join(&filename), &data)
        .await
        .map_err(|e| tag_request_id(AppError::internal(e.to_string()), &headers))?;

    let url = format!("/uploads/{}", filename);
    state
        .orders
        .attach_payment_proof(&order_ref, &url)
        .await
        .map_err(|e| tag_request_id(e.into(), &headers))?;

    info!(order_ref = %order_ref, url = %url, "payment proof attached");
    Ok(Json(UploadProofResponse { success: true, url }))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state
        .store
        .admin_api_token
        .as_deref()
        .ok_or_else(|| AppError::new(crate::error::AppErrorKind::Unauthorized))?;
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(tag_request_id(
            AppError::new(crate::error::AppErrorKind::Unauthorized),
            headers,
        )),
    }
}
