//! Multi-gateway payment integration.
//!
//! Each regional gateway speaks its own protocol (payload encoding, signature
//! scheme, callback transport); the adapters in `gateways/` translate those
//! protocols into the uniform [`gateway::PaymentGateway`] contract so the
//! checkout service never branches on gateway identity beyond adapter lookup.

pub mod error;
pub mod factory;
pub mod gateway;
pub mod gateways;
pub mod http;
pub mod signature;
pub mod types;

pub use error::{PaymentError, PaymentResult};
pub use factory::{GatewayRegistry, ResolveGateway};
pub use gateway::PaymentGateway;
pub use types::{CallbackOutcome, CustomerContact, GatewayName, InitiationPayload, InitiationRequest};
