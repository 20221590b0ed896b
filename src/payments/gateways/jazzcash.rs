//! JazzCash mobile-wallet adapter.
//!
//! Initiation is an auto-submitting form POST against the hosted merchant
//! page; the fields are authenticated with an HMAC-SHA256 secure hash keyed
//! by the merchant integrity salt. The gateway reports the outcome with a
//! server-to-server form POST which must re-verify against the same hash.

use crate::orders::model::generate_order_ref;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::signature::{jazzcash_secure_hash, verify_jazzcash_callback};
use crate::payments::types::{
    CallbackOutcome, GatewayName, InitiationPayload, InitiationRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

pub const SUCCESS_RESPONSE_CODE: &str = "000";

#[derive(Debug, Clone)]
pub struct JazzCashConfig {
    pub merchant_id: String,
    pub password: String,
    pub integrity_salt: String,
    pub return_url: String,
    pub api_url: String,
}

impl JazzCashConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let merchant_id = std::env::var("JAZZCASH_MERCHANT_ID").unwrap_or_default();
        let password = std::env::var("JAZZCASH_PASSWORD").unwrap_or_default();
        let integrity_salt = std::env::var("JAZZCASH_INTEGRITY_SALT").unwrap_or_default();
        let return_url = std::env::var("JAZZCASH_RETURN_URL").unwrap_or_default();
        if merchant_id.is_empty()
            || password.is_empty()
            || integrity_salt.is_empty()
            || return_url.is_empty()
        {
            return Err(PaymentError::ValidationError {
                message: "JAZZCASH_MERCHANT_ID, JAZZCASH_PASSWORD, JAZZCASH_INTEGRITY_SALT and JAZZCASH_RETURN_URL are required"
                    .to_string(),
                field: Some("jazzcash".to_string()),
            });
        }
        Ok(Self {
            merchant_id,
            password,
            integrity_salt,
            return_url,
            api_url: std::env::var("JAZZCASH_API_URL").unwrap_or_else(|_| {
                "https://sandbox.jazzcash.com.pk/CustomerPortal/transactionmanagement/merchantform"
                    .to_string()
            }),
        })
    }
}

pub struct JazzCashGateway {
    config: JazzCashConfig,
}

impl JazzCashGateway {
    pub fn new(config: JazzCashConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self::new(JazzCashConfig::from_env()?))
    }

    fn compact_datetime(at: DateTime<Utc>) -> String {
        at.format("%Y%m%d%H%M%S").to_string()
    }

    /// Last ten digits of the wallet account number, digits only.
    fn normalize_phone(raw: &str) -> PaymentResult<String> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 10 {
            return Err(PaymentError::ValidationError {
                message: "phone must contain at least 10 digits".to_string(),
                field: Some("phone".to_string()),
            });
        }
        Ok(digits[digits.len() - 10..].to_string())
    }
}

#[async_trait]
impl PaymentGateway for JazzCashGateway {
    async fn build_initiation(
        &self,
        request: InitiationRequest,
    ) -> PaymentResult<InitiationPayload> {
        request.validate_amount()?;
        let phone = request
            .customer
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(PaymentError::ValidationError {
                message: "phone is required for JazzCash payments".to_string(),
                field: Some("phone".to_string()),
            })?;
        let phone = Self::normalize_phone(phone)?;

        let now = Utc::now();
        let expiry = now + Duration::hours(1);
        let txn_ref = format!("T{}", Self::compact_datetime(now));
        // Wallet amounts are wired in paisa.
        let amount_paisa = request
            .amount
            .checked_mul(100)
            .ok_or(PaymentError::ValidationError {
                message: "amount out of range".to_string(),
                field: Some("amount".to_string()),
            })?;

        // The transaction reference doubles as the provisional order
        // identifier so the callback can locate the pending order.
        let order_ref = request.order_ref.unwrap_or_else(generate_order_ref);
        let description: String = request.description.chars().take(100).collect();

        let mut fields: Vec<(String, String)> = vec![
            ("pp_Version".to_string(), "1.1".to_string()),
            ("pp_TxnType".to_string(), "MWALLET".to_string()),
            ("pp_Language".to_string(), "EN".to_string()),
            ("pp_MerchantID".to_string(), self.config.merchant_id.clone()),
            ("pp_Password".to_string(), self.config.password.clone()),
            ("pp_TxnRefNo".to_string(), txn_ref),
            ("pp_Amount".to_string(), amount_paisa.to_string()),
            ("pp_TxnCurrency".to_string(), "PKR".to_string()),
            ("pp_TxnDateTime".to_string(), Self::compact_datetime(now)),
            ("pp_BillReference".to_string(), order_ref.clone()),
            ("pp_Description".to_string(), description),
            (
                "pp_TxnExpiryDateTime".to_string(),
                Self::compact_datetime(expiry),
            ),
            ("pp_ReturnURL".to_string(), self.config.return_url.clone()),
        ];
        if let Some(email) = request.customer.email.as_deref().filter(|e| !e.is_empty()) {
            fields.push(("ppmpf_1".to_string(), email.to_string()));
        }
        fields.push(("ppmpf_2".to_string(), phone));

        let sorted: BTreeMap<String, String> = fields.iter().cloned().collect();
        let secure_hash = jazzcash_secure_hash(&self.config.integrity_salt, &sorted);
        fields.push(("pp_SecureHash".to_string(), secure_hash));

        Ok(InitiationPayload {
            gateway: GatewayName::JazzCash,
            order_ref,
            destination_url: self.config.api_url.clone(),
            fields,
            checkout_url: None,
        })
    }

    fn parse_callback(&self, params: &BTreeMap<String, String>) -> CallbackOutcome {
        let is_authentic = verify_jazzcash_callback(&self.config.integrity_salt, params);

        let order_ref = params
            .get("pp_BillReference")
            .filter(|v| !v.is_empty())
            .or_else(|| params.get("pp_TxnRefNo").filter(|v| !v.is_empty()))
            .cloned();
        let is_success = params
            .get("pp_ResponseCode")
            .map(|code| code == SUCCESS_RESPONSE_CODE)
            .unwrap_or(false);

        CallbackOutcome {
            gateway: GatewayName::JazzCash,
            order_ref,
            is_authentic,
            is_success,
            gateway_txn_id: params.get("pp_TxnRefNo").cloned(),
            failure_reason: params.get("pp_ResponseMessage").cloned(),
        }
    }

    fn name(&self) -> GatewayName {
        GatewayName::JazzCash
    }
}
