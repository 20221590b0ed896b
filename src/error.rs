//! Unified error handling for the Little Threads backend.
//!
//! Errors carry a machine-readable code, an HTTP status mapping, and a
//! user-safe message. Handlers convert everything into the standard JSON
//! error body via `middleware::error`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "ORDER_ALREADY_PAID")]
    OrderAlreadyPaid,
    #[serde(rename = "INVALID_STATUS_TRANSITION")]
    InvalidStatusTransition,
    #[serde(rename = "COUPON_REJECTED")]
    CouponRejected,

    // Validation errors (400)
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,

    // Auth (401)
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502/503)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,

    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No order exists for the given public identifier
    OrderNotFound { order_ref: String },
    /// Payment confirmation attempted on an already-settled order
    OrderAlreadyPaid { order_ref: String },
    /// Requested status change is not allowed by the lifecycle machine
    InvalidStatusTransition { from: String, to: String },
    /// Coupon failed validation (inactive, expired, over limit, below minimum)
    CouponRejected { reason: String },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing or empty
    MissingField { field: String },
    /// Free-form validation failure with a user-safe message
    Invalid { message: String },
    /// Amount is invalid (non-positive or out of range)
    InvalidAmount { amount: i64, reason: String },
    /// Phone number fails format validation
    InvalidPhone { phone: String },
    /// Unknown payment method or gateway name
    InvalidPaymentMethod { value: String },
    /// Upload exceeds the size limit
    FileTooLarge { limit_bytes: usize },
    /// Upload is not an accepted content type
    UnsupportedFileType { content_type: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// External service errors (payment gateways, notification relay)
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentGateway {
        gateway: String,
        message: String,
        is_retryable: bool,
    },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Validation(ValidationError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Unauthorized,
    Internal { message: String },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn validation(error: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(error))
    }

    pub fn domain(error: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(error))
    }

    pub fn missing_field(field: &str) -> Self {
        Self::validation(ValidationError::MissingField {
            field: field.to_string(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::OrderNotFound { .. }) => ErrorCode::OrderNotFound,
            AppErrorKind::Domain(DomainError::OrderAlreadyPaid { .. }) => {
                ErrorCode::OrderAlreadyPaid
            }
            AppErrorKind::Domain(DomainError::InvalidStatusTransition { .. }) => {
                ErrorCode::InvalidStatusTransition
            }
            AppErrorKind::Domain(DomainError::CouponRejected { .. }) => ErrorCode::CouponRejected,
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::Unauthorized => ErrorCode::Unauthorized,
            AppErrorKind::Infrastructure(InfrastructureError::Database { .. }) => {
                ErrorCode::DatabaseError
            }
            AppErrorKind::Infrastructure(InfrastructureError::Configuration { .. }) => {
                ErrorCode::ConfigurationError
            }
            AppErrorKind::External(ExternalError::PaymentGateway { .. }) => {
                ErrorCode::PaymentGatewayError
            }
            AppErrorKind::Internal { .. } => ErrorCode::InternalError,
        }
    }

    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(DomainError::OrderNotFound { .. }) => 404,
            AppErrorKind::Domain(DomainError::CouponRejected { .. }) => 400,
            AppErrorKind::Domain(_) => 409,
            AppErrorKind::Validation(ValidationError::FileTooLarge { .. }) => 413,
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::Unauthorized => 401,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(_) => 502,
            AppErrorKind::Internal { .. } => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Infrastructure(InfrastructureError::Database {
                is_retryable, ..
            }) => *is_retryable,
            AppErrorKind::External(ExternalError::PaymentGateway { is_retryable, .. }) => {
                *is_retryable
            }
            _ => false,
        }
    }

    /// Message safe to surface to end users. Internal detail stays in logs.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(DomainError::OrderNotFound { order_ref }) => {
                format!("Order {} was not found", order_ref)
            }
            AppErrorKind::Domain(DomainError::OrderAlreadyPaid { .. }) => {
                "This order has already been paid".to_string()
            }
            AppErrorKind::Domain(DomainError::InvalidStatusTransition { from, to }) => {
                format!("Order cannot move from {} to {}", from, to)
            }
            AppErrorKind::Domain(DomainError::CouponRejected { reason }) => reason.clone(),
            AppErrorKind::Validation(error) => error.user_message(),
            AppErrorKind::Unauthorized => "Unauthorized".to_string(),
            AppErrorKind::Infrastructure(_) => {
                "A storage error occurred. Please try again later".to_string()
            }
            AppErrorKind::External(_) => "Payment initiation failed".to_string(),
            AppErrorKind::Internal { .. } => {
                "An internal error occurred. Please try again later".to_string()
            }
        }
    }
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::MissingField { field } => format!("{} is required", field),
            ValidationError::Invalid { message } => message.clone(),
            ValidationError::InvalidAmount { reason, .. } => reason.clone(),
            ValidationError::InvalidPhone { .. } => "Invalid phone number".to_string(),
            ValidationError::InvalidPaymentMethod { value } => {
                format!("Unsupported payment method: {}", value)
            }
            ValidationError::FileTooLarge { limit_bytes } => {
                format!("File size must be under {} MB", limit_bytes / (1024 * 1024))
            }
            ValidationError::UnsupportedFileType { .. } => {
                "Only image files are allowed".to_string()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

impl std::error::Error for AppError {}
