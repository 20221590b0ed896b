//! Order ledger: the authoritative record and mutation surface for orders.

pub mod coupons;
pub mod model;
pub mod status;
pub mod store;

pub use coupons::{Coupon, CouponStore, DiscountType, InMemoryCouponStore, PgCouponStore};
pub use model::{
    generate_order_ref, Customer, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod,
    ShippingAddress,
};
pub use store::{
    FulfillmentPatch, InMemoryOrderStore, OrderStore, PaymentConfirmation, PgOrderStore,
    StoreError,
};
