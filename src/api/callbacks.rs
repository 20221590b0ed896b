//! Gateway callback endpoints.
//!
//! Each handler resolves to a customer-facing redirect (and, for the
//! SafePay webhook, a JSON acknowledgment) no matter what happens inside:
//! an unanswered callback would only invite the gateway's retry storm.
//! Authenticity failures redirect to the generic failure view with no hint
//! of why verification failed.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::AppState;
use crate::payments::types::GatewayName;
use crate::services::checkout::CallbackDisposition;

/// POST /api/payments/jazzcash/callback — server-to-server form POST.
pub async fn jazzcash_callback(
    State(state): State<AppState>,
    Form(params): Form<BTreeMap<String, String>>,
) -> Redirect {
    let disposition = state
        .checkout
        .handle_callback(GatewayName::JazzCash, &params)
        .await;
    redirect_for(&state, disposition)
}

/// GET /api/payments/easypaisa/callback — redirect with query parameters.
pub async fn easypaisa_callback(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Redirect {
    let disposition = state
        .checkout
        .handle_callback(GatewayName::EasyPaisa, &params)
        .await;
    redirect_for(&state, disposition)
}

/// GET /api/payments/safepay/callback — customer redirect after hosted
/// checkout.
pub async fn safepay_redirect(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Redirect {
    let disposition = state
        .checkout
        .handle_callback(GatewayName::SafePay, &params)
        .await;
    redirect_for(&state, disposition)
}

/// POST /api/payments/safepay/webhook — server webhook. Always answers 200
/// so the gateway stops retrying; the ledger guard makes replays harmless.
pub async fn safepay_webhook(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    // A malformed body still gets its 200: the parse simply yields no
    // usable parameters and the callback resolves as a failure internally.
    let params = body
        .ok()
        .map(|Json(value)| flatten_webhook_data(&value))
        .unwrap_or_default();

    let _ = state
        .checkout
        .handle_callback(GatewayName::SafePay, &params)
        .await;

    (
        StatusCode::OK,
        Json(serde_json::json!({ "received": true })),
    )
}

/// Pull the string fields out of the webhook's `data` envelope.
fn flatten_webhook_data(body: &Value) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    let Some(data) = body.get("data").and_then(|d| d.as_object()) else {
        return params;
    };
    for (key, value) in data {
        if let Some(text) = value.as_str() {
            params.insert(key.clone(), text.to_string());
        }
    }
    params
}

fn redirect_for(state: &AppState, disposition: CallbackDisposition) -> Redirect {
    let base = state.store.app_base_url.trim_end_matches('/');
    let url = match disposition {
        CallbackDisposition::Confirmed { order_ref, gateway } => format!(
            "{}/order-confirmed?id={}&method={}",
            base,
            query_encode(&order_ref),
            gateway.display_name()
        ),
        CallbackDisposition::Failed { order_ref, reason } => {
            let mut url = format!("{}/payment-failed", base);
            let mut separator = '?';
            if let Some(order_ref) = order_ref {
                url.push(separator);
                url.push_str("ref=");
                url.push_str(&query_encode(&order_ref));
                separator = '&';
            }
            if let Some(reason) = reason {
                url.push(separator);
                url.push_str("reason=");
                url.push_str(&query_encode(&reason));
            }
            url
        }
    };
    Redirect::to(&url)
}

fn query_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_data_envelope_is_flattened_to_strings() {
        let body = serde_json::json!({
            "data": {
                "tracker": "trk_123",
                "status": "paid",
                "order_id": "LT-2026-AB12C3456",
                "amount": 270000
            }
        });
        let params = flatten_webhook_data(&body);
        assert_eq!(params.get("tracker").map(String::as_str), Some("trk_123"));
        assert_eq!(params.get("status").map(String::as_str), Some("paid"));
        assert_eq!(
            params.get("order_id").map(String::as_str),
            Some("LT-2026-AB12C3456")
        );
        // non-string fields are dropped, not stringified
        assert!(!params.contains_key("amount"));
    }

    #[test]
    fn webhook_without_data_yields_empty_params() {
        assert!(flatten_webhook_data(&serde_json::json!({})).is_empty());
        assert!(flatten_webhook_data(&serde_json::json!({"data": null})).is_empty());
    }

    #[test]
    fn query_encode_escapes_spaces_and_reserved() {
        assert_eq!(query_encode("Insufficient balance"), "Insufficient%20balance");
        assert_eq!(query_encode("LT-2026-AB12C3456"), "LT-2026-AB12C3456");
    }
}
