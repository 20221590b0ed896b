//! Pricing invariants exercised end to end: the quote identity, the
//! free-shipping threshold boundary, and coupon discount bounds.

use chrono::Utc;
use little_threads_backend::orders::coupons::{Coupon, DiscountType};
use little_threads_backend::orders::model::OrderItem;
use little_threads_backend::services::pricing::{
    apply_coupon, quote, shipping_cost, subtotal_of, PricingConfig,
};

fn config() -> PricingConfig {
    PricingConfig {
        free_shipping_threshold: 3000,
        shipping_fee: 200,
    }
}

fn item(name: &str, price: i64, quantity: u32) -> OrderItem {
    OrderItem {
        name: name.to_string(),
        price,
        quantity,
        size: None,
        color: None,
        image: None,
    }
}

fn percentage_coupon(value: i64, cap: Option<i64>) -> Coupon {
    Coupon {
        code: "SAVE".to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: value,
        minimum_order_amount: None,
        max_discount_amount: cap,
        usage_limit: None,
        used_count: 0,
        expires_at: None,
        is_active: true,
    }
}

#[test]
fn quote_identity_holds_across_cart_shapes() {
    let config = config();
    let carts: Vec<Vec<OrderItem>> = vec![
        vec![item("Dino T-Shirt", 1250, 2)],
        vec![item("Striped Socks", 300, 1)],
        vec![item("Rain Jacket", 4500, 1), item("Beanie", 650, 3)],
        vec![item("Onesie", 999, 7)],
    ];

    for items in carts {
        let subtotal = subtotal_of(&items);
        let q = quote(subtotal, 0, &config);
        assert_eq!(q.total, q.subtotal - q.discount + q.shipping_cost);
        assert!(q.subtotal >= 0 && q.discount >= 0 && q.shipping_cost >= 0 && q.total >= 0);
    }
}

#[test]
fn shipping_is_free_exactly_at_the_threshold() {
    let config = config();
    assert_eq!(shipping_cost(2999, &config), 200);
    assert_eq!(shipping_cost(3000, &config), 0);
    assert_eq!(shipping_cost(3001, &config), 0);
    assert_eq!(shipping_cost(0, &config), 200);
}

#[test]
fn bank_transfer_cart_prices_to_expected_totals() {
    // ₨2,500 cart under the ₨3,000 threshold pays the flat ₨200 fee.
    let items = vec![item("Dino T-Shirt", 1250, 2)];
    let subtotal = subtotal_of(&items);
    assert_eq!(subtotal, 2500);

    let q = quote(subtotal, 0, &config());
    assert_eq!(q.shipping_cost, 200);
    assert_eq!(q.total, 2700);
}

#[test]
fn fifty_percent_coupon_is_held_to_its_cap() {
    let coupon = percentage_coupon(50, Some(2000));
    let discount = apply_coupon(&coupon, 10_000, Utc::now()).expect("coupon applies");
    assert_eq!(discount, 2000);

    let q = quote(10_000, discount, &config());
    assert_eq!(q.shipping_cost, 0);
    assert_eq!(q.total, 8000);
}

#[test]
fn discount_never_exceeds_subtotal() {
    let generous = Coupon {
        code: "FLAT5000".to_string(),
        discount_type: DiscountType::Fixed,
        discount_value: 5000,
        minimum_order_amount: None,
        max_discount_amount: None,
        usage_limit: None,
        used_count: 0,
        expires_at: None,
        is_active: true,
    };
    for subtotal in [1, 300, 4999, 5000, 20_000] {
        let discount = apply_coupon(&generous, subtotal, Utc::now()).expect("coupon applies");
        assert!(discount <= subtotal, "subtotal {}", subtotal);

        let q = quote(subtotal, discount, &config());
        assert_eq!(q.total, q.subtotal - q.discount + q.shipping_cost);
        assert!(q.total >= 0);
    }

    let uncapped = percentage_coupon(100, None);
    let discount = apply_coupon(&uncapped, 750, Utc::now()).expect("coupon applies");
    assert_eq!(discount, 750);
}
