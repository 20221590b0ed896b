use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Callback verification failed: {message}")]
    CallbackVerificationError { message: String },

    #[error("Gateway error: gateway={gateway}, message={message}")]
    GatewayError {
        gateway: String,
        message: String,
        gateway_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::CallbackVerificationError { .. } => false,
            PaymentError::GatewayError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::CallbackVerificationError { .. } => 401,
            PaymentError::GatewayError { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::NetworkError { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to the payment gateway. Please retry shortly".to_string()
            }
            PaymentError::CallbackVerificationError { .. } => "Payment verification failed".to_string(),
            PaymentError::GatewayError { .. } => "Payment initiation failed".to_string(),
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};

        match err {
            PaymentError::ValidationError { message, field: _ } => {
                AppError::new(AppErrorKind::Validation(ValidationError::Invalid { message }))
            }
            other => AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
                gateway: "payments".to_string(),
                message: other.to_string(),
                is_retryable: other.is_retryable(),
            })),
        }
    }
}
