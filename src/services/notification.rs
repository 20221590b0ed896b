//! Fire-and-forget order notifications.
//!
//! Dispatch is best-effort by contract: a notification failure is logged and
//! swallowed, never propagated, because the order/payment outcome is
//! authoritative. Delivery is a structured log line plus an optional HTTP
//! relay; WhatsApp deep links for support and admin alerting are generated
//! alongside.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::orders::model::Order;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// A new order was placed (COD, bank transfer, or pre-payment SafePay).
    async fn notify_order_placed(&self, order: &Order);

    /// A gateway confirmed payment. Fired at most once per order by the
    /// ledger's idempotency guard.
    async fn notify_payment_confirmed(&self, order: &Order);
}

pub struct NotificationService {
    store_name: String,
    support_whatsapp: Option<String>,
    admin_whatsapp: Option<String>,
    relay_url: Option<String>,
    http: reqwest::Client,
}

impl NotificationService {
    pub fn new(
        store_name: String,
        support_whatsapp: Option<String>,
        admin_whatsapp: Option<String>,
        relay_url: Option<String>,
    ) -> Self {
        Self {
            store_name,
            support_whatsapp,
            admin_whatsapp,
            relay_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn support_link(&self, order: &Order) -> Option<String> {
        self.support_whatsapp.as_ref().map(|number| {
            format!(
                "https://wa.me/{}?text={}",
                number,
                urlencode(&format!("Hi! I need help with my order #{}", order.order_ref))
            )
        })
    }

    pub fn admin_alert_link(&self, order: &Order) -> Option<String> {
        self.admin_whatsapp.as_ref().map(|number| {
            format!(
                "https://wa.me/{}?text={}",
                number,
                urlencode(&format!(
                    "New Order! #{}\nAmount: Rs{}\nPayment: {}\nCustomer: {}\nCity: {}",
                    order.order_ref,
                    order.total_price,
                    order.payment_method,
                    order.shipping_address.full_name,
                    order.shipping_address.city
                ))
            )
        })
    }

    async fn dispatch(&self, event: &str, order: &Order) {
        let recipient = order.customer.email();
        info!(
            event,
            order_ref = %order.order_ref,
            total = order.total_price,
            payment_method = %order.payment_method,
            recipient = recipient.unwrap_or("-"),
            store = %self.store_name,
            "order notification"
        );

        let Some(relay_url) = self.relay_url.as_deref() else {
            return;
        };
        let body = json!({
            "event": event,
            "storeName": self.store_name,
            "orderRef": order.order_ref,
            "recipient": recipient,
            "customerName": order.shipping_address.full_name,
            "items": order.items,
            "subtotal": order.subtotal,
            "shippingCost": order.shipping_cost,
            "discount": order.discount,
            "totalPrice": order.total_price,
            "paymentMethod": order.payment_method,
            "status": order.status,
            "supportLink": self.support_link(order),
        });
        if let Err(e) = self.http.post(relay_url).json(&body).send().await {
            warn!(order_ref = %order.order_ref, error = %e, "notification relay failed");
        }
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify_order_placed(&self, order: &Order) {
        self.dispatch("order.placed", order).await;
    }

    async fn notify_payment_confirmed(&self, order: &Order) {
        self.dispatch("payment.confirmed", order).await;
    }
}

/// Minimal percent-encoding for the WhatsApp deep-link query text.
fn urlencode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
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
