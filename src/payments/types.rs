use crate::payments::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayName {
    JazzCash,
    EasyPaisa,
    SafePay,
}

impl GatewayName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayName::JazzCash => "jazzcash",
            GatewayName::EasyPaisa => "easypaisa",
            GatewayName::SafePay => "safepay",
        }
    }

    /// Display name used in redirects and customer-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            GatewayName::JazzCash => "JazzCash",
            GatewayName::EasyPaisa => "EasyPaisa",
            GatewayName::SafePay => "SafePay",
        }
    }
}

impl std::fmt::Display for GatewayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GatewayName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "jazzcash" => Ok(GatewayName::JazzCash),
            "easypaisa" => Ok(GatewayName::EasyPaisa),
            "safepay" => Ok(GatewayName::SafePay),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported gateway: {}", value),
                field: Some("gateway".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input to a gateway initiation.
///
/// `order_ref` is `Some` only for gateways whose order is persisted before
/// payment (SafePay); wallet gateways generate their own provisional
/// reference inside the adapter.
#[derive(Debug, Clone)]
pub struct InitiationRequest {
    pub order_ref: Option<String>,
    /// Whole rupees; adapters apply their own wire encoding.
    pub amount: i64,
    pub customer: CustomerContact,
    pub description: String,
}

impl InitiationRequest {
    pub fn validate_amount(&self) -> Result<(), PaymentError> {
        if self.amount <= 0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        Ok(())
    }
}

/// Everything the client needs to hand the customer over to a gateway.
#[derive(Debug, Clone, Serialize)]
pub struct InitiationPayload {
    pub gateway: GatewayName,
    /// The order identifier for this attempt: provisional for wallet
    /// gateways, the already-persisted identifier for SafePay.
    pub order_ref: String,
    /// Hosted page to POST or redirect to.
    pub destination_url: String,
    /// Signed form/query fields, in wire order.
    pub fields: Vec<(String, String)>,
    /// Hosted checkout URL for token-based gateways.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Result of parsing an inbound gateway callback.
///
/// Parsing is total: malformed or tampered input yields
/// `is_authentic == false` rather than an error.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub gateway: GatewayName,
    pub order_ref: Option<String>,
    pub is_authentic: bool,
    pub is_success: bool,
    pub gateway_txn_id: Option<String>,
    /// Gateway-supplied decline reason in UI-safe form, when available.
    pub failure_reason: Option<String>,
}

impl CallbackOutcome {
    pub fn rejected(gateway: GatewayName) -> Self {
        Self {
            gateway,
            order_ref: None,
            is_authentic: false,
            is_success: false,
            gateway_txn_id: None,
            failure_reason: None,
        }
    }
}
