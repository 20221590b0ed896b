//! HTTP handlers.

pub mod callbacks;
pub mod coupons;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::AppError;
use crate::orders::coupons::CouponStore;
use crate::orders::store::OrderStore;
use crate::services::checkout::CheckoutService;
use crate::services::notification::NotificationService;

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<dyn OrderStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub notifications: Arc<NotificationService>,
    pub store: Arc<StoreConfig>,
    /// `None` when running on the in-memory stores.
    pub db_pool: Option<sqlx::PgPool>,
}

/// Attach the request id from headers to an error before it is rendered.
pub(crate) fn tag_request_id(error: AppError, headers: &axum::http::HeaderMap) -> AppError {
    match crate::middleware::error::get_request_id_from_headers(headers) {
        Some(request_id) => error.with_request_id(request_id),
        None => error,
    }
}
