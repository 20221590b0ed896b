//! Checkout orchestration over the in-memory stores and real gateway
//! adapters wired with explicit test configs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use little_threads_backend::orders::coupons::{Coupon, CouponStore, DiscountType, InMemoryCouponStore};
use little_threads_backend::orders::model::{
    Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
};
use little_threads_backend::orders::store::{FulfillmentPatch, InMemoryOrderStore, OrderStore};
use little_threads_backend::payments::error::PaymentResult;
use little_threads_backend::payments::factory::ResolveGateway;
use little_threads_backend::payments::gateway::PaymentGateway;
use little_threads_backend::payments::gateways::easypaisa::{EasyPaisaConfig, EasyPaisaGateway};
use little_threads_backend::payments::gateways::jazzcash::{JazzCashConfig, JazzCashGateway};
use little_threads_backend::payments::gateways::safepay::{
    SafePayConfig, SafePayEnvironment, SafePayGateway,
};
use little_threads_backend::payments::types::GatewayName;
use little_threads_backend::services::checkout::{
    CallbackDisposition, CheckoutService, PlaceOrderRequest,
};
use little_threads_backend::services::notification::Notifier;
use little_threads_backend::services::pricing::PricingConfig;

#[derive(Default)]
struct CountingNotifier {
    placed: AtomicUsize,
    confirmed: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify_order_placed(&self, _order: &Order) {
        self.placed.fetch_add(1, Ordering::SeqCst);
    }

    async fn notify_payment_confirmed(&self, _order: &Order) {
        self.confirmed.fetch_add(1, Ordering::SeqCst);
    }
}

struct TestGateways;

impl ResolveGateway for TestGateways {
    fn resolve(&self, gateway: GatewayName) -> PaymentResult<Box<dyn PaymentGateway>> {
        match gateway {
            GatewayName::JazzCash => Ok(Box::new(JazzCashGateway::new(JazzCashConfig {
                merchant_id: "MC12345".to_string(),
                password: "secret".to_string(),
                integrity_salt: "salt123".to_string(),
                return_url: "https://shop.example.com/api/payments/jazzcash/callback".to_string(),
                api_url: "https://sandbox.jazzcash.com.pk/CustomerPortal/transactionmanagement/merchantform".to_string(),
            }))),
            GatewayName::EasyPaisa => Ok(Box::new(EasyPaisaGateway::new(EasyPaisaConfig {
                store_id: "9001".to_string(),
                hash_key: "hashkey".to_string(),
                return_url: "https://shop.example.com/api/payments/easypaisa/callback".to_string(),
                api_url: "https://easypaystg.easypaisa.com.pk/easypay/Index.jsf".to_string(),
            }))),
            GatewayName::SafePay => Ok(Box::new(SafePayGateway::new(SafePayConfig {
                api_key: "sec_test_key".to_string(),
                secret_key: "merchant_secret".to_string(),
                environment: SafePayEnvironment::Sandbox,
                app_base_url: "https://shop.example.com".to_string(),
                timeout_secs: 5,
                max_retries: 0,
            })?)),
        }
    }
}

struct Harness {
    orders: Arc<InMemoryOrderStore>,
    coupons: Arc<InMemoryCouponStore>,
    notifier: Arc<CountingNotifier>,
    checkout: CheckoutService,
}

fn harness() -> Harness {
    let orders = Arc::new(InMemoryOrderStore::new());
    let coupons = Arc::new(InMemoryCouponStore::new());
    let notifier = Arc::new(CountingNotifier::default());
    let checkout = CheckoutService::new(
        orders.clone(),
        coupons.clone(),
        Arc::new(TestGateways),
        notifier.clone(),
        PricingConfig {
            free_shipping_threshold: 3000,
            shipping_fee: 200,
        },
        "Little Threads".to_string(),
    );
    Harness {
        orders,
        coupons,
        notifier,
        checkout,
    }
}

fn place_request(method: PaymentMethod) -> PlaceOrderRequest {
    PlaceOrderRequest {
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
        coupon_code: None,
        notes: None,
        user_id: None,
        guest_name: Some("Ayesha Khan".to_string()),
        guest_email: Some("ayesha@example.com".to_string()),
        guest_phone: None,
    }
}

fn ten_percent_coupon() -> Coupon {
    Coupon {
        code: "SAVE10".to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: 10,
        minimum_order_amount: None,
        max_discount_amount: None,
        usage_limit: Some(100),
        used_count: 0,
        expires_at: None,
        is_active: true,
    }
}

#[tokio::test]
async fn cod_order_is_created_synchronously_and_notified() {
    let h = harness();
    let placed = h
        .checkout
        .place_order(place_request(PaymentMethod::Cod))
        .await
        .expect("order should be placed");

    assert_eq!(placed.order.status, OrderStatus::Processing);
    assert!(!placed.order.is_paid);
    assert_eq!(placed.order.subtotal, 2500);
    assert_eq!(placed.order.shipping_cost, 200);
    assert_eq!(placed.order.total_price, 2700);
    assert_eq!(h.notifier.placed.load(Ordering::SeqCst), 1);

    let stored = h
        .orders
        .find_by_ref(&placed.order.order_ref)
        .await
        .expect("lookup should succeed")
        .expect("order should be persisted");
    assert_eq!(stored.order_ref, placed.order.order_ref);
}

#[tokio::test]
async fn bank_transfer_order_awaits_payment_through_proof_upload() {
    let h = harness();
    let placed = h
        .checkout
        .place_order(place_request(PaymentMethod::BankTransfer))
        .await
        .expect("order should be placed");

    assert_eq!(placed.order.status, OrderStatus::AwaitingPayment);
    assert!(!placed.order.is_paid);
    assert_eq!(placed.order.total_price, 2700);

    let updated = h
        .orders
        .attach_payment_proof(&placed.order.order_ref, "/uploads/proof-1.jpg")
        .await
        .expect("attach should succeed")
        .expect("order should exist");
    assert_eq!(updated.status, OrderStatus::AwaitingPayment);
    assert_eq!(updated.payment_proof_url.as_deref(), Some("/uploads/proof-1.jpg"));
    assert!(!updated.is_paid);
}

#[tokio::test]
async fn wallet_methods_cannot_use_the_synchronous_order_path() {
    let h = harness();
    for method in [PaymentMethod::JazzCash, PaymentMethod::EasyPaisa] {
        assert!(h.checkout.place_order(place_request(method)).await.is_err());
    }
    assert_eq!(h.notifier.placed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wallet_initiation_persists_a_provisional_pending_order() {
    let h = harness();
    let payload = h
        .checkout
        .initiate_wallet_checkout(
            GatewayName::EasyPaisa,
            place_request(PaymentMethod::EasyPaisa),
        )
        .await
        .expect("initiation should succeed");
    assert!(payload.order_ref.starts_with("LT-"));

    let provisional = h
        .orders
        .find_by_ref(&payload.order_ref)
        .await
        .expect("lookup should succeed")
        .expect("provisional order should be durable");
    assert_eq!(provisional.status, OrderStatus::Pending);
    assert!(!provisional.is_paid);
    assert_eq!(provisional.payment_method, PaymentMethod::EasyPaisa);
    assert_eq!(provisional.total_price, 2700);
}

#[tokio::test]
async fn failed_initiation_leaves_no_order_and_no_coupon_use() {
    let h = harness();
    h.coupons.insert(ten_percent_coupon()).await;

    // Seven digits passes address validation but is too short for the
    // wallet account, so the adapter rejects the initiation.
    let mut request = place_request(PaymentMethod::JazzCash);
    request.shipping_address.phone = "0300123".to_string();
    request.coupon_code = Some("SAVE10".to_string());

    let result = h
        .checkout
        .initiate_wallet_checkout(GatewayName::JazzCash, request)
        .await;
    assert!(result.is_err());

    assert_eq!(h.notifier.placed.load(Ordering::SeqCst), 0);
    let coupon = h
        .coupons
        .find_by_code("SAVE10")
        .await
        .expect("lookup should succeed")
        .expect("coupon exists");
    assert_eq!(coupon.used_count, 0);
}

#[tokio::test]
async fn coupon_is_redeemed_once_at_order_creation() {
    let h = harness();
    h.coupons.insert(ten_percent_coupon()).await;

    let mut request = place_request(PaymentMethod::Cod);
    request.coupon_code = Some("save10".to_string());
    let placed = h
        .checkout
        .place_order(request)
        .await
        .expect("order should be placed");

    assert_eq!(placed.order.discount, 250);
    assert_eq!(placed.order.total_price, 2450);
    assert_eq!(placed.order.coupon_code.as_deref(), Some("SAVE10"));

    let coupon = h
        .coupons
        .find_by_code("SAVE10")
        .await
        .expect("lookup should succeed")
        .expect("coupon exists");
    assert_eq!(coupon.used_count, 1);
}

#[tokio::test]
async fn safepay_order_exists_before_checkout_and_confirms_on_callback() {
    let h = harness();
    let placed = h
        .checkout
        .place_order(place_request(PaymentMethod::SafePay))
        .await
        .expect("order should be placed");
    assert_eq!(placed.order.status, OrderStatus::Processing);
    assert!(!placed.order.is_paid);

    let params = [
        ("orderId", placed.order.order_ref.as_str()),
        ("tracker", "trk_42"),
        ("status", "paid"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let disposition = h.checkout.handle_callback(GatewayName::SafePay, &params).await;
    assert!(matches!(disposition, CallbackDisposition::Confirmed { .. }));

    let confirmed = h
        .orders
        .find_by_ref(&placed.order.order_ref)
        .await
        .expect("lookup should succeed")
        .expect("order exists");
    assert!(confirmed.is_paid);
    assert!(confirmed.paid_at.is_some());
    // Card orders stay in fulfillment rather than jumping to Confirmed.
    assert_eq!(confirmed.status, OrderStatus::Processing);
    assert_eq!(confirmed.gateway_txn_id.as_deref(), Some("trk_42"));
    assert_eq!(h.notifier.confirmed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn admin_delivery_settles_cod_payment() {
    let h = harness();
    let placed = h
        .checkout
        .place_order(place_request(PaymentMethod::Cod))
        .await
        .expect("order should be placed");

    h.orders
        .update_fulfillment(
            &placed.order.order_ref,
            FulfillmentPatch {
                status: Some(OrderStatus::Shipped),
                tracking_number: Some("TCS-98765".to_string()),
            },
            Utc::now(),
        )
        .await
        .expect("ship should succeed");

    let now = Utc::now();
    let delivered = h
        .orders
        .update_fulfillment(
            &placed.order.order_ref,
            FulfillmentPatch {
                status: Some(OrderStatus::Delivered),
                tracking_number: None,
            },
            now,
        )
        .await
        .expect("deliver should succeed");

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.is_paid);
    assert_eq!(delivered.paid_at, Some(now));
}
