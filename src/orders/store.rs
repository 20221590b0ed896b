//! Order persistence.
//!
//! `OrderStore` is the single mutation surface for order state. Every write
//! is one conditional patch scoped to a single order identifier; the
//! payment-confirmation guard re-checks `is_paid` inside the update itself
//! so replayed callbacks converge instead of double-firing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::orders::model::{Customer, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
use crate::orders::status::settle_on_delivery;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict("duplicate key".to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<StoreError> for crate::error::AppError {
    fn from(err: StoreError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};
        match err {
            StoreError::NotFound => AppError::domain(crate::error::DomainError::OrderNotFound {
                order_ref: String::new(),
            }),
            StoreError::InvalidTransition { from, to } => {
                AppError::domain(crate::error::DomainError::InvalidStatusTransition { from, to })
            }
            StoreError::Conflict(message) => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message,
                    is_retryable: true,
                }))
            }
            StoreError::Backend(message) => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message,
                    is_retryable: true,
                }))
            }
        }
    }
}

/// Result of the idempotent payment-confirmation patch.
#[derive(Debug)]
pub enum PaymentConfirmation {
    /// The guard matched: this callback is the first to confirm payment.
    Applied(Order),
    /// A previous callback already settled payment; no state changed.
    AlreadyPaid(Order),
    /// The order is in a terminal state and cannot accept payment.
    Unpayable(Order),
    /// No order exists for the identifier.
    NotFound,
}

/// Admin fulfillment update: status and/or tracking number.
#[derive(Debug, Clone, Default)]
pub struct FulfillmentPatch {
    pub status: Option<OrderStatus>,
    pub tracking_number: Option<String>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, new_order: NewOrder) -> Result<Order, StoreError>;

    /// Fetch by public order identifier, the only lookup key exposed to the
    /// callback path.
    async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, StoreError>;

    /// Idempotently settle payment for an order. The `is_paid` check and the
    /// write are one atomic patch; replays observe `AlreadyPaid`.
    async fn confirm_payment(
        &self,
        order_ref: &str,
        method: PaymentMethod,
        gateway_txn_id: Option<&str>,
        confirmed_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmation, StoreError>;

    /// Admin path. Moving to `Delivered` settles payment as a side effect
    /// (see `orders::status::settle_on_delivery`).
    async fn update_fulfillment(
        &self,
        order_ref: &str,
        patch: FulfillmentPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError>;

    /// Attach an uploaded proof-of-payment and park the order in
    /// `Awaiting Payment` regardless of its current status.
    async fn attach_payment_proof(
        &self,
        order_ref: &str,
        proof_url: &str,
    ) -> Result<Option<Order>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

const ORDER_COLUMNS: &str = "id, order_ref, items, shipping_address, payment_method, subtotal, \
     shipping_cost, discount, total_price, coupon_code, notes, is_paid, paid_at, status, \
     tracking_number, payment_proof_url, gateway_txn_id, user_id, guest_name, guest_email, \
     guest_phone, created_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_ref: String,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    subtotal: i64,
    shipping_cost: i64,
    discount: i64,
    total_price: i64,
    coupon_code: Option<String>,
    notes: Option<String>,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    status: String,
    tracking_number: Option<String>,
    payment_proof_url: Option<String>,
    gateway_txn_id: Option<String>,
    user_id: Option<Uuid>,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_db_status(&row.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown order status: {}", row.status)))?;
        let payment_method = PaymentMethod::from_str(&row.payment_method).map_err(|_| {
            StoreError::Backend(format!("unknown payment method: {}", row.payment_method))
        })?;
        let customer = match (row.user_id, row.guest_email) {
            (Some(user_id), _) => Customer::Registered { user_id },
            (None, Some(guest_email)) => Customer::Guest {
                guest_name: row.guest_name.unwrap_or_default(),
                guest_email,
                guest_phone: row.guest_phone,
            },
            (None, None) => {
                return Err(StoreError::Backend(
                    "order row has neither user nor guest contact".to_string(),
                ))
            }
        };

        Ok(Order {
            id: row.id,
            order_ref: row.order_ref,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            payment_method,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            discount: row.discount,
            total_price: row.total_price,
            coupon_code: row.coupon_code,
            notes: row.notes,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            status,
            tracking_number: row.tracking_number,
            payment_proof_url: row.payment_proof_url,
            gateway_txn_id: row.gateway_txn_id,
            customer,
            created_at: row.created_at,
        })
    }
}

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, new_order: NewOrder) -> Result<Order, StoreError> {
        let (user_id, guest_name, guest_email, guest_phone) = match &new_order.customer {
            Customer::Registered { user_id } => (Some(*user_id), None, None, None),
            Customer::Guest {
                guest_name,
                guest_email,
                guest_phone,
            } => (
                None,
                Some(guest_name.clone()),
                Some(guest_email.clone()),
                guest_phone.clone(),
            ),
        };

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders \
             (order_ref, items, shipping_address, payment_method, subtotal, shipping_cost, \
              discount, total_price, coupon_code, notes, is_paid, status, user_id, guest_name, \
              guest_email, guest_phone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11, $12, $13, $14, $15) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&new_order.order_ref)
        .bind(Json(&new_order.items))
        .bind(Json(&new_order.shipping_address))
        .bind(new_order.payment_method.as_str())
        .bind(new_order.subtotal)
        .bind(new_order.shipping_cost)
        .bind(new_order.discount)
        .bind(new_order.total_price)
        .bind(&new_order.coupon_code)
        .bind(&new_order.notes)
        .bind(new_order.status.as_str())
        .bind(user_id)
        .bind(guest_name)
        .bind(guest_email)
        .bind(guest_phone)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_ref = $1"
        ))
        .bind(order_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn confirm_payment(
        &self,
        order_ref: &str,
        method: PaymentMethod,
        gateway_txn_id: Option<&str>,
        confirmed_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmation, StoreError> {
        // Guard and write in one statement: only the first confirmation for
        // an unpaid, non-terminal order matches.
        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET is_paid = TRUE, paid_at = $2, status = $3, payment_method = $4, \
                 gateway_txn_id = COALESCE($5, gateway_txn_id) \
             WHERE order_ref = $1 AND is_paid = FALSE \
                 AND status NOT IN ('Delivered', 'Cancelled') \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_ref)
        .bind(now)
        .bind(confirmed_status.as_str())
        .bind(method.as_str())
        .bind(gateway_txn_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(PaymentConfirmation::Applied(row.try_into()?));
        }

        match self.find_by_ref(order_ref).await? {
            Some(order) if order.is_paid => Ok(PaymentConfirmation::AlreadyPaid(order)),
            Some(order) => Ok(PaymentConfirmation::Unpayable(order)),
            None => Ok(PaymentConfirmation::NotFound),
        }
    }

    async fn update_fulfillment(
        &self,
        order_ref: &str,
        patch: FulfillmentPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let current = self
            .find_by_ref(order_ref)
            .await?
            .ok_or(StoreError::NotFound)?;

        if let Some(next) = patch.status {
            if !current.status.can_transition(next) {
                return Err(StoreError::InvalidTransition {
                    from: current.status.to_string(),
                    to: next.to_string(),
                });
            }
        }
        let settling = patch.status == Some(OrderStatus::Delivered);

        // The WHERE clause re-validates the precondition so a concurrent
        // update cannot slip a different status underneath this patch.
        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET \
                 status = COALESCE($3, status), \
                 tracking_number = COALESCE($4, tracking_number), \
                 is_paid = CASE WHEN $5 THEN TRUE ELSE is_paid END, \
                 paid_at = CASE WHEN $5 THEN COALESCE(paid_at, $6) ELSE paid_at END \
             WHERE order_ref = $1 AND status = $2 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_ref)
        .bind(current.status.as_str())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.tracking_number)
        .bind(settling)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => row.try_into(),
            None => Err(StoreError::Conflict(
                "order changed concurrently, retry the update".to_string(),
            )),
        }
    }

    async fn attach_payment_proof(
        &self,
        order_ref: &str,
        proof_url: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET payment_proof_url = $2, status = 'Awaiting Payment' \
             WHERE order_ref = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_ref)
        .bind(proof_url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests and database-less development)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, new_order: NewOrder) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&new_order.order_ref) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                new_order.order_ref
            )));
        }

        let order = Order {
            id: Uuid::new_v4(),
            order_ref: new_order.order_ref.clone(),
            items: new_order.items,
            shipping_address: new_order.shipping_address,
            payment_method: new_order.payment_method,
            subtotal: new_order.subtotal,
            shipping_cost: new_order.shipping_cost,
            discount: new_order.discount,
            total_price: new_order.total_price,
            coupon_code: new_order.coupon_code,
            notes: new_order.notes,
            is_paid: false,
            paid_at: None,
            status: new_order.status,
            tracking_number: None,
            payment_proof_url: None,
            gateway_txn_id: None,
            customer: new_order.customer,
            created_at: Utc::now(),
        };
        orders.insert(order.order_ref.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_ref(&self, order_ref: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(order_ref).cloned())
    }

    async fn confirm_payment(
        &self,
        order_ref: &str,
        method: PaymentMethod,
        gateway_txn_id: Option<&str>,
        confirmed_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmation, StoreError> {
        // Check and write under one lock: the in-memory analogue of the
        // conditional UPDATE.
        let mut orders = self.orders.write().await;
        let order = match orders.get_mut(order_ref) {
            Some(order) => order,
            None => return Ok(PaymentConfirmation::NotFound),
        };

        if order.is_paid {
            return Ok(PaymentConfirmation::AlreadyPaid(order.clone()));
        }
        if order.status.is_terminal() {
            return Ok(PaymentConfirmation::Unpayable(order.clone()));
        }

        order.is_paid = true;
        order.paid_at = Some(now);
        order.status = confirmed_status;
        order.payment_method = method;
        if let Some(txn_id) = gateway_txn_id {
            order.gateway_txn_id = Some(txn_id.to_string());
        }
        Ok(PaymentConfirmation::Applied(order.clone()))
    }

    async fn update_fulfillment(
        &self,
        order_ref: &str,
        patch: FulfillmentPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_ref).ok_or(StoreError::NotFound)?;

        if let Some(next) = patch.status {
            if !order.status.can_transition(next) {
                return Err(StoreError::InvalidTransition {
                    from: order.status.to_string(),
                    to: next.to_string(),
                });
            }
            if next == OrderStatus::Delivered {
                settle_on_delivery(order, now);
            } else {
                order.status = next;
            }
        }
        if let Some(tracking) = patch.tracking_number {
            order.tracking_number = Some(tracking);
        }
        Ok(order.clone())
    }

    async fn attach_payment_proof(
        &self,
        order_ref: &str,
        proof_url: &str,
    ) -> Result<Option<Order>, StoreError> {
        let mut orders = self.orders.write().await;
        let order = match orders.get_mut(order_ref) {
            Some(order) => order,
            None => return Ok(None),
        };
        order.payment_proof_url = Some(proof_url.to_string());
        order.status = OrderStatus::AwaitingPayment;
        Ok(Some(order.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::model::generate_order_ref;
    use crate::orders::status::initial_status;

    fn new_order(method: PaymentMethod) -> NewOrder {
        NewOrder {
            order_ref: generate_order_ref(),
            items: vec![OrderItem {
                name: "Dino T-Shirt".to_string(),
                price: 1250,
                quantity: 2,
                size: Some("4-5Y".to_string()),
                color: Some("Green".to_string()),
                image: None,
            }],
            shipping_address: ShippingAddress {
                full_name: "Ayesha Khan".to_string(),
                phone: "03001234567".to_string(),
                address: "House 12, Street 4".to_string(),
                city: "Lahore".to_string(),
                province: "Punjab".to_string(),
                postal_code: "54000".to_string(),
            },
            payment_method: method,
            subtotal: 2500,
            shipping_cost: 200,
            discount: 0,
            total_price: 2700,
            coupon_code: None,
            notes: None,
            status: initial_status(method),
            customer: Customer::Guest {
                guest_name: "Ayesha Khan".to_string(),
                guest_email: "ayesha@example.com".to_string(),
                guest_phone: None,
            },
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create(new_order(PaymentMethod::Cod))
            .await
            .expect("create should succeed");
        let found = store
            .find_by_ref(&created.order_ref)
            .await
            .expect("find should succeed")
            .expect("order should exist");
        assert_eq!(found.order_ref, created.order_ref);
        assert!(!found.is_paid);
        assert_eq!(found.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn duplicate_order_ref_is_a_conflict() {
        let store = InMemoryOrderStore::new();
        let mut order = new_order(PaymentMethod::Cod);
        order.order_ref = "LT-2026-FIXED0001".to_string();
        store.create(order.clone()).await.expect("first create");
        assert!(matches!(
            store.create(order).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn confirm_payment_is_idempotent() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create(new_order(PaymentMethod::JazzCash))
            .await
            .expect("create should succeed");
        let now = Utc::now();

        let first = store
            .confirm_payment(
                &created.order_ref,
                PaymentMethod::JazzCash,
                Some("T20260805120000"),
                OrderStatus::Confirmed,
                now,
            )
            .await
            .expect("confirm should succeed");
        let order = match first {
            PaymentConfirmation::Applied(order) => order,
            other => panic!("expected Applied, got {:?}", other),
        };
        assert!(order.is_paid);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.gateway_txn_id.as_deref(), Some("T20260805120000"));

        let second = store
            .confirm_payment(
                &created.order_ref,
                PaymentMethod::JazzCash,
                Some("T20260805120000"),
                OrderStatus::Confirmed,
                Utc::now(),
            )
            .await
            .expect("replay should succeed");
        let replayed = match second {
            PaymentConfirmation::AlreadyPaid(order) => order,
            other => panic!("expected AlreadyPaid, got {:?}", other),
        };
        assert_eq!(replayed.paid_at, Some(now));
    }

    #[tokio::test]
    async fn confirm_payment_on_unknown_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let outcome = store
            .confirm_payment(
                "LT-2026-MISSING01",
                PaymentMethod::EasyPaisa,
                None,
                OrderStatus::Confirmed,
                Utc::now(),
            )
            .await
            .expect("lookup should succeed");
        assert!(matches!(outcome, PaymentConfirmation::NotFound));
    }

    #[tokio::test]
    async fn cancelled_orders_cannot_be_paid() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create(new_order(PaymentMethod::JazzCash))
            .await
            .expect("create should succeed");
        store
            .update_fulfillment(
                &created.order_ref,
                FulfillmentPatch {
                    status: Some(OrderStatus::Cancelled),
                    tracking_number: None,
                },
                Utc::now(),
            )
            .await
            .expect("cancel should succeed");

        let outcome = store
            .confirm_payment(
                &created.order_ref,
                PaymentMethod::JazzCash,
                None,
                OrderStatus::Confirmed,
                Utc::now(),
            )
            .await
            .expect("confirm should not error");
        assert!(matches!(outcome, PaymentConfirmation::Unpayable(_)));
    }

    #[tokio::test]
    async fn delivered_transition_settles_payment() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create(new_order(PaymentMethod::Cod))
            .await
            .expect("create should succeed");
        store
            .update_fulfillment(
                &created.order_ref,
                FulfillmentPatch {
                    status: Some(OrderStatus::Shipped),
                    tracking_number: Some("TCS-12345".to_string()),
                },
                Utc::now(),
            )
            .await
            .expect("ship should succeed");

        let now = Utc::now();
        let delivered = store
            .update_fulfillment(
                &created.order_ref,
                FulfillmentPatch {
                    status: Some(OrderStatus::Delivered),
                    tracking_number: None,
                },
                now,
            )
            .await
            .expect("deliver should succeed");
        assert!(delivered.is_paid);
        assert_eq!(delivered.paid_at, Some(now));
        assert_eq!(delivered.tracking_number.as_deref(), Some("TCS-12345"));
    }

    #[tokio::test]
    async fn terminal_orders_reject_further_transitions() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create(new_order(PaymentMethod::Cod))
            .await
            .expect("create should succeed");
        store
            .update_fulfillment(
                &created.order_ref,
                FulfillmentPatch {
                    status: Some(OrderStatus::Delivered),
                    tracking_number: None,
                },
                Utc::now(),
            )
            .await
            .expect("deliver should succeed");

        let result = store
            .update_fulfillment(
                &created.order_ref,
                FulfillmentPatch {
                    status: Some(OrderStatus::Processing),
                    tracking_number: None,
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn proof_upload_parks_order_in_awaiting_payment() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create(new_order(PaymentMethod::BankTransfer))
            .await
            .expect("create should succeed");
        assert_eq!(created.status, OrderStatus::AwaitingPayment);

        let updated = store
            .attach_payment_proof(&created.order_ref, "/uploads/proof-1.jpg")
            .await
            .expect("attach should succeed")
            .expect("order should exist");
        assert_eq!(updated.status, OrderStatus::AwaitingPayment);
        assert_eq!(
            updated.payment_proof_url.as_deref(),
            Some("/uploads/proof-1.jpg")
        );
        assert!(!updated.is_paid);
    }
}
