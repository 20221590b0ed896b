//! Checkout orchestration.
//!
//! One service drives every checkout shape the storefront supports:
//!
//! * COD / bank transfer: the order is created synchronously, no gateway.
//! * Wallet gateways (JazzCash, EasyPaisa): a provisional `Pending` order is
//!   persisted at initiation under the adapter's provisional reference; the
//!   verified callback confirms it. A payment only counts as an order once
//!   the ledger transition applies, but the record is durable from the start
//!   so a lost client session cannot orphan a paid attempt.
//! * SafePay: the order is created first, then a hosted checkout is opened
//!   against its identifier; the callback only updates payment state.
//!
//! Callback handling is idempotent end to end: the ledger's conditional
//! confirm-payment patch decides whether this delivery is novel, and the
//! confirmation notification fires only on the novel one.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, DomainError, ValidationError};
use crate::orders::coupons::CouponStore;
use crate::orders::model::{
    generate_order_ref, Customer, NewOrder, Order, OrderItem, PaymentMethod, ShippingAddress,
};
use crate::orders::status::{confirmed_status, initial_status};
use crate::orders::store::{OrderStore, PaymentConfirmation};
use crate::payments::factory::ResolveGateway;
use crate::payments::types::{
    CustomerContact, GatewayName, InitiationPayload, InitiationRequest,
};
use crate::services::notification::Notifier;
use crate::services::pricing::{self, PricingConfig, Quote};

/// Checkout submission from the storefront.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
}

#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
}

/// What a callback handler should do next. Handlers always resolve to one of
/// these; internal failures degrade to `Failed` so the gateway gets its
/// redirect/acknowledgment either way.
#[derive(Debug, Clone)]
pub enum CallbackDisposition {
    Confirmed {
        order_ref: String,
        gateway: GatewayName,
    },
    Failed {
        order_ref: Option<String>,
        /// Gateway-supplied decline reason, already UI-safe. Authenticity
        /// failures never carry a reason.
        reason: Option<String>,
    },
}

pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    coupons: Arc<dyn CouponStore>,
    gateways: Arc<dyn ResolveGateway>,
    notifier: Arc<dyn Notifier>,
    pricing: PricingConfig,
    store_name: String,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        coupons: Arc<dyn CouponStore>,
        gateways: Arc<dyn ResolveGateway>,
        notifier: Arc<dyn Notifier>,
        pricing: PricingConfig,
        store_name: String,
    ) -> Self {
        Self {
            orders,
            coupons,
            gateways,
            notifier,
            pricing,
            store_name,
        }
    }

    /// Price a cart, applying the coupon if one is given. Returns the quote
    /// and the normalized coupon code that was actually applied.
    pub async fn price_cart(
        &self,
        items: &[OrderItem],
        coupon_code: Option<&str>,
    ) -> Result<(Quote, Option<String>), AppError> {
        let subtotal = pricing::subtotal_of(items);
        let mut discount = 0;
        let mut applied_code = None;

        if let Some(code) = coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            let coupon = self
                .coupons
                .find_by_code(code)
                .await?
                .ok_or_else(|| {
                    AppError::domain(DomainError::CouponRejected {
                        reason: "Invalid coupon code".to_string(),
                    })
                })?;
            discount = pricing::apply_coupon(&coupon, subtotal, Utc::now()).map_err(|rejection| {
                AppError::domain(DomainError::CouponRejected {
                    reason: rejection.user_message(),
                })
            })?;
            applied_code = Some(coupon.code);
        }

        Ok((pricing::quote(subtotal, discount, &self.pricing), applied_code))
    }

    /// Synchronous order creation: COD, bank transfer, and the SafePay
    /// pre-payment order. Wallet methods must go through
    /// [`initiate_wallet_checkout`] instead.
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<PlacedOrder, AppError> {
        if matches!(
            request.payment_method,
            PaymentMethod::JazzCash | PaymentMethod::EasyPaisa
        ) {
            return Err(AppError::validation(ValidationError::Invalid {
                message: format!(
                    "{} orders are created through the gateway initiation endpoint",
                    request.payment_method
                ),
            }));
        }

        let order = self
            .create_order(generate_order_ref(), request, None)
            .await?;
        self.notifier.notify_order_placed(&order).await;
        Ok(PlacedOrder { order })
    }

    /// Wallet checkout: build the signed gateway payload, persist the
    /// provisional order under the adapter's reference, hand the payload
    /// back for the client-side redirect. A failed initiation leaves no
    /// order behind.
    pub async fn initiate_wallet_checkout(
        &self,
        gateway: GatewayName,
        request: PlaceOrderRequest,
    ) -> Result<InitiationPayload, AppError> {
        let method = match gateway {
            GatewayName::JazzCash => PaymentMethod::JazzCash,
            GatewayName::EasyPaisa => PaymentMethod::EasyPaisa,
            GatewayName::SafePay => {
                return Err(AppError::validation(ValidationError::Invalid {
                    message: "SafePay checkout starts from an existing order".to_string(),
                }))
            }
        };
        if request.payment_method != method {
            return Err(AppError::validation(ValidationError::InvalidPaymentMethod {
                value: request.payment_method.to_string(),
            }));
        }

        request.shipping_address.validate()?;
        let (quote, _) = self
            .price_cart(&request.items, request.coupon_code.as_deref())
            .await?;

        let adapter = self.gateways.resolve(gateway)?;
        let payload = adapter
            .build_initiation(InitiationRequest {
                order_ref: None,
                amount: quote.total,
                customer: CustomerContact {
                    email: request.guest_email.clone(),
                    phone: Some(request.shipping_address.phone.clone()),
                },
                description: format!("{} order payment", self.store_name),
            })
            .await?;

        // Durable provisional record keyed by the adapter's reference; the
        // callback transitions it out of `Pending` once verified.
        let order = self
            .create_order(payload.order_ref.clone(), request, Some(method))
            .await?;
        info!(
            order_ref = %order.order_ref,
            gateway = %gateway,
            total = order.total_price,
            "provisional order created for wallet checkout"
        );

        Ok(payload)
    }

    /// Hosted-checkout initiation against an already-persisted order.
    pub async fn initiate_hosted_checkout(
        &self,
        order_ref: &str,
    ) -> Result<InitiationPayload, AppError> {
        let order = self
            .orders
            .find_by_ref(order_ref)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::OrderNotFound {
                    order_ref: order_ref.to_string(),
                })
            })?;
        if order.is_paid {
            return Err(AppError::domain(DomainError::OrderAlreadyPaid {
                order_ref: order.order_ref,
            }));
        }

        let adapter = self.gateways.resolve(GatewayName::SafePay)?;
        let payload = adapter
            .build_initiation(InitiationRequest {
                order_ref: Some(order.order_ref.clone()),
                amount: order.total_price,
                customer: CustomerContact {
                    email: order.customer.email().map(str::to_string),
                    phone: Some(order.shipping_address.phone.clone()),
                },
                description: format!("Order #{} - {}", order.order_ref, self.store_name),
            })
            .await?;

        Ok(payload)
    }

    /// Process an inbound gateway callback. Never errors: every path ends
    /// in a disposition the HTTP layer can turn into a redirect or an
    /// acknowledgment, so the gateway's retry machinery is always answered.
    pub async fn handle_callback(
        &self,
        gateway: GatewayName,
        params: &BTreeMap<String, String>,
    ) -> CallbackDisposition {
        let adapter = match self.gateways.resolve(gateway) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!(gateway = %gateway, error = %e, "callback received for unavailable gateway");
                return CallbackDisposition::Failed {
                    order_ref: None,
                    reason: None,
                };
            }
        };

        let outcome = adapter.parse_callback(params);
        if !outcome.is_authentic {
            // Verification detail stays in the log; the response discloses
            // nothing about the signature construction.
            warn!(
                gateway = %gateway,
                order_ref = outcome.order_ref.as_deref().unwrap_or("-"),
                "callback failed authenticity verification"
            );
            return CallbackDisposition::Failed {
                order_ref: outcome.order_ref,
                reason: None,
            };
        }
        if !outcome.is_success {
            info!(
                gateway = %gateway,
                order_ref = outcome.order_ref.as_deref().unwrap_or("-"),
                reason = outcome.failure_reason.as_deref().unwrap_or("-"),
                "gateway reported payment failure"
            );
            return CallbackDisposition::Failed {
                order_ref: outcome.order_ref,
                reason: outcome.failure_reason,
            };
        }

        let Some(order_ref) = outcome.order_ref else {
            warn!(gateway = %gateway, "successful callback without an order reference");
            return CallbackDisposition::Failed {
                order_ref: None,
                reason: None,
            };
        };

        let method = match gateway {
            GatewayName::JazzCash => PaymentMethod::JazzCash,
            GatewayName::EasyPaisa => PaymentMethod::EasyPaisa,
            GatewayName::SafePay => PaymentMethod::SafePay,
        };
        let confirmation = self
            .orders
            .confirm_payment(
                &order_ref,
                method,
                outcome.gateway_txn_id.as_deref(),
                confirmed_status(method),
                Utc::now(),
            )
            .await;

        match confirmation {
            Ok(PaymentConfirmation::Applied(order)) => {
                info!(order_ref = %order.order_ref, gateway = %gateway, "payment confirmed");
                self.notifier.notify_payment_confirmed(&order).await;
                CallbackDisposition::Confirmed {
                    order_ref: order.order_ref,
                    gateway,
                }
            }
            Ok(PaymentConfirmation::AlreadyPaid(order)) => {
                // Replayed delivery: converge on the same success response
                // without re-notifying.
                info!(order_ref = %order.order_ref, gateway = %gateway, "duplicate callback ignored");
                CallbackDisposition::Confirmed {
                    order_ref: order.order_ref,
                    gateway,
                }
            }
            Ok(PaymentConfirmation::Unpayable(order)) => {
                warn!(
                    order_ref = %order.order_ref,
                    status = %order.status,
                    "callback for order in terminal state"
                );
                CallbackDisposition::Failed {
                    order_ref: Some(order.order_ref),
                    reason: None,
                }
            }
            Ok(PaymentConfirmation::NotFound) => {
                warn!(order_ref = %order_ref, gateway = %gateway, "callback for unknown order");
                CallbackDisposition::Failed {
                    order_ref: Some(order_ref),
                    reason: None,
                }
            }
            Err(e) => {
                error!(order_ref = %order_ref, error = %e, "ledger update failed during callback");
                CallbackDisposition::Failed {
                    order_ref: Some(order_ref),
                    reason: None,
                }
            }
        }
    }

    async fn create_order(
        &self,
        order_ref: String,
        request: PlaceOrderRequest,
        method_override: Option<PaymentMethod>,
    ) -> Result<Order, AppError> {
        let payment_method = method_override.unwrap_or(request.payment_method);
        let (quote, applied_code) = self
            .price_cart(&request.items, request.coupon_code.as_deref())
            .await?;

        let customer = match request.user_id {
            Some(user_id) => Customer::Registered { user_id },
            None => Customer::Guest {
                guest_name: request
                    .guest_name
                    .clone()
                    .unwrap_or_else(|| request.shipping_address.full_name.clone()),
                guest_email: request.guest_email.clone().ok_or_else(|| {
                    AppError::missing_field("guestEmail")
                })?,
                guest_phone: request
                    .guest_phone
                    .clone()
                    .or_else(|| Some(request.shipping_address.phone.clone())),
            },
        };

        let status = if method_override.is_some() {
            // Provisional wallet order: not a real order until paid.
            crate::orders::model::OrderStatus::Pending
        } else {
            initial_status(payment_method)
        };

        let new_order = NewOrder {
            order_ref,
            items: request.items,
            shipping_address: request.shipping_address,
            payment_method,
            subtotal: quote.subtotal,
            shipping_cost: quote.shipping_cost,
            discount: quote.discount,
            total_price: quote.total,
            coupon_code: applied_code.clone(),
            notes: request.notes,
            status,
            customer,
        };
        new_order.validate()?;

        let order = self.orders.create(new_order).await?;

        // Best-effort: a failed increment never blocks the order.
        if let Some(code) = applied_code {
            match self.coupons.redeem(&code).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(order_ref = %order.order_ref, coupon = %code, "coupon redeem skipped")
                }
                Err(e) => {
                    warn!(order_ref = %order.order_ref, coupon = %code, error = %e, "coupon redeem failed")
                }
            }
        }

        Ok(order)
    }
}
