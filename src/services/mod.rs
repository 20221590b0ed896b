//! Business logic services: pricing, checkout orchestration, notifications.

pub mod checkout;
pub mod notification;
pub mod pricing;

pub use checkout::{CallbackDisposition, CheckoutService, PlaceOrderRequest, PlacedOrder};
pub use notification::{NotificationService, Notifier};
pub use pricing::{PricingConfig, Quote};
