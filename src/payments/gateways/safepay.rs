//! SafePay hosted-checkout adapter.
//!
//! Initiation is a server-to-server call that exchanges the merchant secret
//! for a tracker token; the customer is then redirected to the hosted
//! checkout page for that token. The outcome comes back twice: a redirect
//! GET for the customer and a webhook POST for the server, both carrying a
//! plain `status` field. The protocol has no payload signature; authenticity
//! is limited to shape validation, and the order ledger's idempotent guard
//! bounds what a forged callback could do.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::http::PaymentHttpClient;
use crate::payments::types::{
    CallbackOutcome, GatewayName, InitiationPayload, InitiationRequest,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

pub const PAID_STATUS: &str = "paid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafePayEnvironment {
    Sandbox,
    Production,
}

impl SafePayEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafePayEnvironment::Sandbox => "sandbox",
            SafePayEnvironment::Production => "production",
        }
    }

    fn api_base(&self) -> &'static str {
        match self {
            SafePayEnvironment::Sandbox => "https://sandbox.api.getsafepay.com",
            SafePayEnvironment::Production => "https://api.getsafepay.com",
        }
    }

    fn checkout_base(&self) -> &'static str {
        match self {
            SafePayEnvironment::Sandbox => "https://sandbox.getsafepay.com/checkout",
            SafePayEnvironment::Production => "https://getsafepay.com/checkout",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafePayConfig {
    pub api_key: String,
    pub secret_key: String,
    pub environment: SafePayEnvironment,
    pub app_base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl SafePayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key = std::env::var("SAFEPAY_API_KEY").unwrap_or_default();
        let secret_key = std::env::var("SAFEPAY_SECRET_KEY").unwrap_or_default();
        if api_key.is_empty() || secret_key.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "SAFEPAY_API_KEY and SAFEPAY_SECRET_KEY are required".to_string(),
                field: Some("safepay".to_string()),
            });
        }
        let environment = match std::env::var("SAFEPAY_ENV").as_deref() {
            Ok("production") => SafePayEnvironment::Production,
            _ => SafePayEnvironment::Sandbox,
        };
        Ok(Self {
            api_key,
            secret_key,
            environment,
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            timeout_secs: std::env::var("SAFEPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("SAFEPAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct SafePayGateway {
    config: SafePayConfig,
    http: PaymentHttpClient,
}

impl SafePayGateway {
    pub fn new(config: SafePayConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(SafePayConfig::from_env()?)
    }
}

#[async_trait]
impl PaymentGateway for SafePayGateway {
    async fn build_initiation(
        &self,
        request: InitiationRequest,
    ) -> PaymentResult<InitiationPayload> {
        request.validate_amount()?;
        // Orders are persisted before a hosted checkout is opened; the
        // callback only ever updates payment state.
        let order_ref = request.order_ref.ok_or(PaymentError::ValidationError {
            message: "an existing order is required before SafePay checkout".to_string(),
            field: Some("order_ref".to_string()),
        })?;

        let amount_paisa = request
            .amount
            .checked_mul(100)
            .ok_or(PaymentError::ValidationError {
                message: "amount out of range".to_string(),
                field: Some("amount".to_string()),
            })?;

        let body = serde_json::json!({
            "merchant_api_key": self.config.api_key,
            "purpose": request.description,
            "amount": amount_paisa,
            "currency": "PKR",
            "order_id": order_ref,
            "source": "custom",
            "cancel_url": format!("{}/payment-failed?id={}", self.config.app_base_url, order_ref),
            "redirect_url": format!(
                "{}/api/payments/safepay/callback?orderId={}",
                self.config.app_base_url, order_ref
            ),
        });

        let url = format!("{}/order/v1/init", self.config.environment.api_base());
        let envelope: SafePayInitEnvelope = self
            .http
            .request_json(
                reqwest::Method::POST,
                &url,
                Some(&body),
                &[
                    ("Content-Type", "application/json"),
                    ("X-SFPY-MERCHANT-SECRET", &self.config.secret_key),
                ],
            )
            .await?;

        let token = envelope
            .data
            .and_then(|d| d.tracker)
            .map(|t| t.token)
            .filter(|t| !t.is_empty())
            .ok_or(PaymentError::GatewayError {
                gateway: "safepay".to_string(),
                message: "no tracker token received from init call".to_string(),
                gateway_code: None,
                retryable: false,
            })?;
        info!(order_ref = %order_ref, "safepay checkout tracker created");

        let checkout_url = format!(
            "{}/{}?env={}",
            self.config.environment.checkout_base(),
            token,
            self.config.environment.as_str()
        );

        Ok(InitiationPayload {
            gateway: GatewayName::SafePay,
            order_ref,
            destination_url: self.config.environment.checkout_base().to_string(),
            fields: vec![("tracker".to_string(), token)],
            checkout_url: Some(checkout_url),
        })
    }

    fn parse_callback(&self, params: &BTreeMap<String, String>) -> CallbackOutcome {
        let order_ref = params
            .get("orderId")
            .filter(|v| !v.is_empty())
            .or_else(|| params.get("order_id").filter(|v| !v.is_empty()))
            .cloned();
        let status = params.get("status").cloned();

        // No signature scheme on this transport: a callback is accepted
        // when it is shaped like one, nothing more.
        let is_authentic = order_ref.is_some() && status.is_some();
        let is_success = status.as_deref() == Some(PAID_STATUS);

        CallbackOutcome {
            gateway: GatewayName::SafePay,
            order_ref,
            is_authentic,
            is_success,
            gateway_txn_id: params.get("tracker").filter(|v| !v.is_empty()).cloned(),
            failure_reason: status.filter(|s| s != PAID_STATUS),
        }
    }

    fn name(&self) -> GatewayName {
        GatewayName::SafePay
    }
}

#[derive(Debug, Deserialize)]
struct SafePayInitEnvelope {
    #[serde(default)]
    data: Option<SafePayInitData>,
}

#[derive(Debug, Deserialize)]
struct SafePayInitData {
    #[serde(default)]
    tracker: Option<SafePayTracker>,
}

#[derive(Debug, Deserialize)]
struct SafePayTracker {
    token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> SafePayGateway {
        SafePayGateway::new(SafePayConfig {
            api_key: "sec_live_key".to_string(),
            secret_key: "merchant_secret".to_string(),
            environment: SafePayEnvironment::Sandbox,
            app_base_url: "https://shop.example.com".to_string(),
            timeout_secs: 5,
            max_retries: 1,
        })
        .expect("gateway init should succeed")
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn redirect_callback_with_paid_status_is_success() {
        let outcome = gateway().parse_callback(&params(&[
            ("orderId", "LT-2026-AB12C3456"),
            ("tracker", "trk_123"),
            ("status", "paid"),
        ]));
        assert!(outcome.is_authentic);
        assert!(outcome.is_success);
        assert_eq!(outcome.gateway_txn_id.as_deref(), Some("trk_123"));
    }

    #[test]
    fn webhook_field_names_are_accepted() {
        let outcome = gateway().parse_callback(&params(&[
            ("order_id", "LT-2026-AB12C3456"),
            ("tracker", "trk_123"),
            ("status", "failed"),
        ]));
        assert!(outcome.is_authentic);
        assert!(!outcome.is_success);
        assert_eq!(outcome.failure_reason.as_deref(), Some("failed"));
    }

    #[test]
    fn callback_without_order_reference_is_rejected() {
        let outcome = gateway().parse_callback(&params(&[("status", "paid")]));
        assert!(!outcome.is_authentic);
        assert!(!outcome.is_success || outcome.order_ref.is_none());
    }

    #[test]
    fn environment_urls_differ() {
        assert_ne!(
            SafePayEnvironment::Sandbox.api_base(),
            SafePayEnvironment::Production.api_base()
        );
    }

    #[test]
    fn init_envelope_parses_nested_tracker() {
        let body = serde_json::json!({
            "data": { "tracker": { "token": "trk_abc" } }
        });
        let envelope: SafePayInitEnvelope =
            serde_json::from_value(body).expect("envelope should parse");
        assert_eq!(
            envelope.data.and_then(|d| d.tracker).map(|t| t.token).as_deref(),
            Some("trk_abc")
        );
    }
}
