//! Order lifecycle state machine.
//!
//! ```text
//! Pending -> Processing -> Confirmed -> Shipped -> Out for Delivery -> Delivered
//! Pending -> Awaiting Payment -> Processing -> ...
//! (any non-terminal) -> Cancelled
//! ```
//!
//! Automated transitions (payment callbacks, proof uploads) go through the
//! store operations in `orders::store`, which consult these rules; the admin
//! fulfillment path may move an order forward along the chain but never
//! backwards, and terminal states accept nothing further.

use chrono::{DateTime, Utc};

use crate::orders::model::{Order, OrderStatus, PaymentMethod};

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::AwaitingPayment => "Awaiting Payment",
            OrderStatus::Processing => "Processing",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "Pending" => Some(OrderStatus::Pending),
            "Awaiting Payment" => Some(OrderStatus::AwaitingPayment),
            "Processing" => Some(OrderStatus::Processing),
            "Confirmed" => Some(OrderStatus::Confirmed),
            "Shipped" => Some(OrderStatus::Shipped),
            "Out for Delivery" => Some(OrderStatus::OutForDelivery),
            "Delivered" => Some(OrderStatus::Delivered),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses reachable from `self`. Forward movement along the
    /// fulfillment chain is allowed (admins may skip steps); regressions
    /// are not.
    pub fn valid_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[AwaitingPayment, Processing, Confirmed, Cancelled],
            AwaitingPayment => &[Processing, Confirmed, Cancelled],
            Processing => &[Confirmed, Shipped, OutForDelivery, Delivered, Cancelled],
            Confirmed => &[Shipped, OutForDelivery, Delivered, Cancelled],
            Shipped => &[OutForDelivery, Delivered, Cancelled],
            OutForDelivery => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition(&self, next: OrderStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status an order starts in, by payment method: bank transfers wait for
/// proof of payment, everything else is actionably placed immediately.
pub fn initial_status(method: PaymentMethod) -> OrderStatus {
    match method {
        PaymentMethod::BankTransfer => OrderStatus::AwaitingPayment,
        _ => OrderStatus::Processing,
    }
}

/// Status a successful gateway callback confirms into. SafePay orders stay
/// in fulfillment (`Processing`); wallet payments confirm the provisional
/// order outright.
pub fn confirmed_status(method: PaymentMethod) -> OrderStatus {
    match method {
        PaymentMethod::SafePay => OrderStatus::Processing,
        _ => OrderStatus::Confirmed,
    }
}

/// The delivery settlement rule, applied when an order is marked
/// `Delivered`: payment is considered collected (cash on delivery), so
/// `is_paid` is forced true and `paid_at` backfilled if unset. This is a
/// deliberate business rule and the only path that flips `is_paid` outside
/// a verified gateway callback.
pub fn settle_on_delivery(order: &mut Order, now: DateTime<Utc>) {
    order.status = OrderStatus::Delivered;
    if !order.is_paid {
        order.is_paid = true;
        order.paid_at = Some(now);
    } else if order.paid_at.is_none() {
        order.paid_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::model::{generate_order_ref, Customer, ShippingAddress};

    fn order(status: OrderStatus, is_paid: bool) -> Order {
        Order {
            id: uuid::Uuid::new_v4(),
            order_ref: generate_order_ref(),
            items: vec![],
            shipping_address: ShippingAddress {
                full_name: "Ayesha Khan".to_string(),
                phone: "03001234567".to_string(),
                address: "House 12".to_string(),
                city: "Lahore".to_string(),
                province: "Punjab".to_string(),
                postal_code: "54000".to_string(),
            },
            payment_method: PaymentMethod::Cod,
            subtotal: 2500,
            shipping_cost: 200,
            discount: 0,
            total_price: 2700,
            coupon_code: None,
            notes: None,
            is_paid,
            paid_at: None,
            status,
            tracking_number: None,
            payment_proof_url: None,
            gateway_txn_id: None,
            customer: Customer::Guest {
                guest_name: "Ayesha Khan".to_string(),
                guest_email: "ayesha@example.com".to_string(),
                guest_phone: None,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn initial_status_by_payment_method() {
        assert_eq!(
            initial_status(PaymentMethod::BankTransfer),
            OrderStatus::AwaitingPayment
        );
        assert_eq!(initial_status(PaymentMethod::Cod), OrderStatus::Processing);
        assert_eq!(
            initial_status(PaymentMethod::SafePay),
            OrderStatus::Processing
        );
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        assert!(OrderStatus::Delivered.valid_transitions().is_empty());
        assert!(OrderStatus::Cancelled.valid_transitions().is_empty());
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Processing));
    }

    #[test]
    fn non_terminal_states_can_cancel() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::AwaitingPayment,
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
        ] {
            assert!(status.can_transition(OrderStatus::Cancelled), "{}", status);
        }
    }

    #[test]
    fn regressions_are_rejected() {
        assert!(!OrderStatus::Shipped.can_transition(OrderStatus::Processing));
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::Pending));
    }

    #[test]
    fn settle_on_delivery_marks_unpaid_orders_paid() {
        let mut order = order(OrderStatus::Shipped, false);
        let now = Utc::now();
        settle_on_delivery(&mut order, now);
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.is_paid);
        assert_eq!(order.paid_at, Some(now));
    }

    #[test]
    fn settle_on_delivery_keeps_existing_paid_at() {
        let mut order = order(OrderStatus::OutForDelivery, true);
        let paid_at = Utc::now() - chrono::Duration::hours(2);
        order.paid_at = Some(paid_at);
        settle_on_delivery(&mut order, Utc::now());
        assert_eq!(order.paid_at, Some(paid_at));
    }

    #[test]
    fn db_status_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::AwaitingPayment,
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_db_status(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::from_db_status("Refunded"), None);
    }
}
