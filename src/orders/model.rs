use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

/// How the customer pays. The three gateway variants map 1:1 onto the
/// adapters in `payments::gateways`; COD and bank transfer never leave the
/// building.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "JazzCash")]
    JazzCash,
    #[serde(rename = "EasyPaisa")]
    EasyPaisa,
    #[serde(rename = "SafePay")]
    SafePay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::JazzCash => "JazzCash",
            PaymentMethod::EasyPaisa => "EasyPaisa",
            PaymentMethod::SafePay => "SafePay",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "COD" => Ok(PaymentMethod::Cod),
            "Bank Transfer" => Ok(PaymentMethod::BankTransfer),
            "JazzCash" => Ok(PaymentMethod::JazzCash),
            "EasyPaisa" => Ok(PaymentMethod::EasyPaisa),
            "SafePay" => Ok(PaymentMethod::SafePay),
            other => Err(AppError::validation(ValidationError::InvalidPaymentMethod {
                value: other.to_string(),
            })),
        }
    }
}

/// Order lifecycle status. Transition rules live in `orders::status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "Awaiting Payment")]
    AwaitingPayment,
    Processing,
    Confirmed,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
}

/// Snapshot of a purchased line item. Values are frozen at purchase time so
/// later catalog edits never rewrite order history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub name: String,
    /// Unit price in whole rupees.
    pub price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub province: String,
    #[serde(default)]
    pub postal_code: String,
}

/// Exactly one of a registered user or guest contact details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Customer {
    Registered {
        user_id: Uuid,
    },
    Guest {
        guest_name: String,
        guest_email: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guest_phone: Option<String>,
    },
}

impl Customer {
    pub fn email(&self) -> Option<&str> {
        match self {
            Customer::Registered { .. } => None,
            Customer::Guest { guest_email, .. } => Some(guest_email.as_str()),
        }
    }
}

/// The persisted order record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Public order identifier (`LT-…`); the idempotency key for every
    /// gateway callback. Immutable once assigned.
    pub order_ref: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total_price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_txn_id: Option<String>,
    #[serde(flatten)]
    pub customer: Customer,
    pub created_at: DateTime<Utc>,
}

/// Input for order creation. `status` is chosen by the caller from
/// `orders::status::initial_status`; payment always starts unconfirmed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_ref: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total_price: i64,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub customer: Customer,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.order_ref.trim().is_empty() {
            return Err(AppError::missing_field("order_ref"));
        }
        if self.items.is_empty() {
            return Err(AppError::missing_field("orderItems"));
        }
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(AppError::missing_field("orderItems[].name"));
            }
            if item.price < 0 {
                return Err(AppError::validation(ValidationError::InvalidAmount {
                    amount: item.price,
                    reason: "item price must be non-negative".to_string(),
                }));
            }
            if item.quantity == 0 {
                return Err(AppError::validation(ValidationError::InvalidAmount {
                    amount: 0,
                    reason: "item quantity must be at least 1".to_string(),
                }));
            }
        }

        self.shipping_address.validate()?;

        for (field, value) in [
            ("subtotal", self.subtotal),
            ("shippingCost", self.shipping_cost),
            ("discount", self.discount),
            ("totalPrice", self.total_price),
        ] {
            if value < 0 {
                return Err(AppError::validation(ValidationError::InvalidAmount {
                    amount: value,
                    reason: format!("{} must be non-negative", field),
                }));
            }
        }
        if self.discount > self.subtotal {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: self.discount,
                reason: "discount cannot exceed subtotal".to_string(),
            }));
        }
        if self.total_price != self.subtotal - self.discount + self.shipping_cost {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: self.total_price,
                reason: "totalPrice must equal subtotal - discount + shippingCost".to_string(),
            }));
        }

        if let Customer::Guest { guest_email, .. } = &self.customer {
            if guest_email.trim().is_empty() {
                return Err(AppError::missing_field("guestEmail"));
            }
        }

        Ok(())
    }
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("fullName", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::missing_field(field));
            }
        }
        if !phone_pattern().is_match(self.phone.trim()) {
            return Err(AppError::validation(ValidationError::InvalidPhone {
                phone: self.phone.clone(),
            }));
        }
        Ok(())
    }
}

fn phone_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^\+?[0-9][0-9\s-]{6,14}$").expect("phone pattern is valid")
    })
}

/// Generate a public order identifier: `LT-<year>-<RAND5><TS4>`.
///
/// Five characters of v4-UUID entropy plus the last four digits of the
/// millisecond clock keep identifiers unique across concurrent checkouts.
pub fn generate_order_ref() -> String {
    let now = Utc::now();
    let random: String = Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(5)
        .collect();
    let ts4 = now.timestamp_millis().rem_euclid(10_000);
    format!("LT-{}-{}{:04}", now.format("%Y"), random, ts4)
}
