//! Gateway initiation endpoints.
//!
//! Wallet gateways receive the full checkout payload so the server can
//! persist a durable provisional order before the redirect; SafePay starts
//! from an order that already exists.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::api::{tag_request_id, AppState};
use crate::error::AppError;
use crate::orders::model::{OrderItem, PaymentMethod, ShippingAddress};
use crate::payments::types::GatewayName;
use crate::services::checkout::PlaceOrderRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCheckoutRequest {
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
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
    #[serde(default)]
    pub email: Option<String>,
}

impl WalletCheckoutRequest {
    fn into_place_order(self, payment_method: PaymentMethod) -> PlaceOrderRequest {
        PlaceOrderRequest {
            items: self.order_items,
            shipping_address: self.shipping_address,
            payment_method,
            coupon_code: self.coupon_code,
            notes: self.notes,
            user_id: self.user_id,
            guest_name: self.guest_name,
            guest_email: self.guest_email.or(self.email),
            guest_phone: self.guest_phone,
        }
    }
}

fn fields_to_object(fields: Vec<(String, String)>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPostResponse {
    pub url: String,
    /// Hidden form fields, signature included, to auto-submit to `url`.
    pub payload: Map<String, Value>,
    pub order_ref: String,
}

/// POST /api/payments/jazzcash
pub async fn init_jazzcash(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WalletCheckoutRequest>,
) -> Result<Json<FormPostResponse>, AppError> {
    let request = body.into_place_order(PaymentMethod::JazzCash);
    let payload = state
        .checkout
        .initiate_wallet_checkout(GatewayName::JazzCash, request)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok(Json(FormPostResponse {
        url: payload.destination_url,
        payload: fields_to_object(payload.fields),
        order_ref: payload.order_ref,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectResponse {
    pub url: String,
    /// Query parameters, signature included, for the redirect to `url`.
    pub params: Map<String, Value>,
    pub order_ref: String,
}

/// POST /api/payments/easypaisa
pub async fn init_easypaisa(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WalletCheckoutRequest>,
) -> Result<Json<RedirectResponse>, AppError> {
    let request = body.into_place_order(PaymentMethod::EasyPaisa);
    let payload = state
        .checkout
        .initiate_wallet_checkout(GatewayName::EasyPaisa, request)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok(Json(RedirectResponse {
        url: payload.destination_url,
        params: fields_to_object(payload.fields),
        order_ref: payload.order_ref,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedCheckoutRequest {
    pub order_ref: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedCheckoutResponse {
    pub checkout_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<String>,
}

/// POST /api/payments/safepay
pub async fn init_safepay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<HostedCheckoutRequest>,
) -> Result<Json<HostedCheckoutResponse>, AppError> {
    let payload = state
        .checkout
        .initiate_hosted_checkout(&body.order_ref)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    let tracker = payload
        .fields
        .iter()
        .find(|(name, _)| name == "tracker")
        .map(|(_, token)| token.clone());
    let checkout_url = payload
        .checkout_url
        .ok_or_else(|| AppError::internal("hosted gateway returned no checkout url"))?;

    Ok(Json(HostedCheckoutResponse {
        checkout_url,
        tracker,
    }))
}
