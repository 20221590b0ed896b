//! EasyPaisa wallet adapter.
//!
//! Initiation is a browser redirect carrying query parameters; the request is
//! authenticated with an MD5 hash over a fixed, ASCII-ordered field string
//! prefixed with the merchant hash key. MD5 is mandated by the gateway
//! protocol and is isolated to this adapter. The outcome arrives as a
//! redirect GET whose query parameters carry the same signature scheme.

use crate::orders::model::generate_order_ref;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::signature::{easypaisa_callback_hash, verify_easypaisa_callback};
use crate::payments::types::{
    CallbackOutcome, GatewayName, InitiationPayload, InitiationRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

pub const SUCCESS_RESPONSE_CODES: [&str; 2] = ["0000", "00"];

#[derive(Debug, Clone)]
pub struct EasyPaisaConfig {
    pub store_id: String,
    pub hash_key: String,
    pub return_url: String,
    pub api_url: String,
}

impl EasyPaisaConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let store_id = std::env::var("EASYPAISA_STORE_ID").unwrap_or_default();
        let hash_key = std::env::var("EASYPAISA_HASH_KEY").unwrap_or_default();
        let return_url = std::env::var("EASYPAISA_RETURN_URL").unwrap_or_default();
        if store_id.is_empty() || hash_key.is_empty() || return_url.is_empty() {
            return Err(PaymentError::ValidationError {
                message:
                    "EASYPAISA_STORE_ID, EASYPAISA_HASH_KEY and EASYPAISA_RETURN_URL are required"
                        .to_string(),
                field: Some("easypaisa".to_string()),
            });
        }
        Ok(Self {
            store_id,
            hash_key,
            return_url,
            api_url: std::env::var("EASYPAISA_API_URL")
                .unwrap_or_else(|_| "https://easypaystg.easypaisa.com.pk/easypay/Index.jsf".to_string()),
        })
    }
}

pub struct EasyPaisaGateway {
    config: EasyPaisaConfig,
}

impl EasyPaisaGateway {
    pub fn new(config: EasyPaisaConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self::new(EasyPaisaConfig::from_env()?))
    }

    fn request_datetime(at: DateTime<Utc>) -> String {
        at.format("%Y%m%d %H:%M:%S").to_string()
    }

    /// Two-decimal amount string, e.g. `2700.00`. Amounts are whole rupees
    /// so the fraction is always zero.
    fn format_amount(amount: i64) -> String {
        format!("{}.00", amount)
    }
}

#[async_trait]
impl PaymentGateway for EasyPaisaGateway {
    async fn build_initiation(
        &self,
        request: InitiationRequest,
    ) -> PaymentResult<InitiationPayload> {
        request.validate_amount()?;

        let now = Utc::now();
        let expiry = now + Duration::hours(1);
        let amount = Self::format_amount(request.amount);
        let request_datetime = Self::request_datetime(now);
        let expiry_datetime = Self::request_datetime(expiry);
        let order_ref = request.order_ref.unwrap_or_else(generate_order_ref);
        let email = request.customer.email.clone().unwrap_or_default();

        // Signed fields only; emailAddress is carried but never hashed.
        let signed: BTreeMap<String, String> = [
            ("amount", amount.as_str()),
            ("autoRedirect", "0"),
            ("expiryDate", expiry_datetime.as_str()),
            ("merchantHashedReq", ""),
            ("merchantRequestDateTime", request_datetime.as_str()),
            ("orderRefNum", order_ref.as_str()),
            ("postBackURL", self.config.return_url.as_str()),
            ("storeId", self.config.store_id.as_str()),
            ("storeType", "ROCKET"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let signature = easypaisa_callback_hash(&self.config.hash_key, &signed);

        let fields = vec![
            ("storeId".to_string(), self.config.store_id.clone()),
            ("amount".to_string(), amount),
            ("postBackURL".to_string(), self.config.return_url.clone()),
            ("orderRefNum".to_string(), order_ref.clone()),
            ("expiryDate".to_string(), expiry_datetime),
            ("autoRedirect".to_string(), "0".to_string()),
            ("storeType".to_string(), "ROCKET".to_string()),
            ("merchantHashedReq".to_string(), String::new()),
            ("merchantRequestDateTime".to_string(), request_datetime),
            ("signature".to_string(), signature),
            ("emailAddress".to_string(), email),
        ];

        Ok(InitiationPayload {
            gateway: GatewayName::EasyPaisa,
            order_ref,
            destination_url: self.config.api_url.clone(),
            fields,
            checkout_url: None,
        })
    }

    fn parse_callback(&self, params: &BTreeMap<String, String>) -> CallbackOutcome {
        let is_authentic = verify_easypaisa_callback(&self.config.hash_key, params);

        let order_ref = params
            .get("orderRefNum")
            .filter(|v| !v.is_empty())
            .or_else(|| params.get("orderId").filter(|v| !v.is_empty()))
            .cloned();
        let is_success = params
            .get("responseCode")
            .map(|code| SUCCESS_RESPONSE_CODES.contains(&code.as_str()))
            .unwrap_or(false);

        CallbackOutcome {
            gateway: GatewayName::EasyPaisa,
            order_ref,
            is_authentic,
            is_success,
            gateway_txn_id: params
                .get("transactionId")
                .or_else(|| params.get("txnRefNo"))
                .cloned(),
            failure_reason: params.get("responseDesc").cloned(),
        }
    }

    fn name(&self) -> GatewayName {
        GatewayName::EasyPaisa
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::CustomerContact;

    fn gateway() -> EasyPaisaGateway {
        EasyPaisaGateway::new(EasyPaisaConfig {
            store_id: "9001".to_string(),
            hash_key: "hashkey".to_string(),
            return_url: "https://shop.example.com/api/payments/easypaisa/callback".to_string(),
            api_url: "https://easypaystg.easypaisa.com.pk/easypay/Index.jsf".to_string(),
        })
    }

    fn request(amount: i64) -> InitiationRequest {
        InitiationRequest {
            order_ref: None,
            amount,
            customer: CustomerContact {
                email: Some("parent@example.com".to_string()),
                phone: Some("03001234567".to_string()),
            },
            description: "Little Threads order".to_string(),
        }
    }

    #[tokio::test]
    async fn initiation_signature_covers_signed_fields_only() {
        let gateway = gateway();
        let payload = gateway
            .build_initiation(request(2700))
            .await
            .expect("initiation should succeed");

        let fields: BTreeMap<String, String> = payload.fields.iter().cloned().collect();
        assert_eq!(fields.get("amount").map(String::as_str), Some("2700.00"));
        assert_eq!(fields.get("storeType").map(String::as_str), Some("ROCKET"));

        // Recompute over the signed subset: everything except the signature
        // and the unsigned emailAddress field.
        let mut signed = fields.clone();
        let signature = signed.remove("signature").expect("signature present");
        signed.remove("emailAddress");
        assert_eq!(easypaisa_callback_hash("hashkey", &signed), signature);
    }

    #[tokio::test]
    async fn provisional_order_ref_uses_storefront_format() {
        let gateway = gateway();
        let payload = gateway
            .build_initiation(request(500))
            .await
            .expect("initiation should succeed");
        assert!(payload.order_ref.starts_with("LT-"));
    }

    #[test]
    fn callback_accepts_both_success_codes() {
        let gateway = gateway();
        for code in ["0000", "00"] {
            let mut params: BTreeMap<String, String> = [
                ("orderRefNum", "LT-2026-AB12C3456"),
                ("transactionId", "EP9988"),
                ("responseCode", code),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
            let hash = easypaisa_callback_hash("hashkey", &params);
            params.insert("signature".to_string(), hash);

            let outcome = gateway.parse_callback(&params);
            assert!(outcome.is_authentic, "code {}", code);
            assert!(outcome.is_success, "code {}", code);
            assert_eq!(outcome.gateway_txn_id.as_deref(), Some("EP9988"));
        }
    }

    #[test]
    fn tampered_callback_is_rejected() {
        let gateway = gateway();
        let mut params: BTreeMap<String, String> = [
            ("orderRefNum", "LT-2026-AB12C3456"),
            ("responseCode", "0000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let hash = easypaisa_callback_hash("hashkey", &params);
        params.insert("signature".to_string(), hash);
        params.insert("orderRefNum".to_string(), "LT-2026-XXXXX0000".to_string());

        let outcome = gateway.parse_callback(&params);
        assert!(!outcome.is_authentic);
    }
}
