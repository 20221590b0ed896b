use crate::payments::error::PaymentResult;
use crate::payments::types::{CallbackOutcome, GatewayName, InitiationPayload, InitiationRequest};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Uniform two-operation contract every gateway adapter implements.
///
/// `build_initiation` is async because some gateways require a
/// server-to-server call before the client can be redirected.
/// `parse_callback` never fails: unverifiable input comes back with
/// `is_authentic == false`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn build_initiation(
        &self,
        request: InitiationRequest,
    ) -> PaymentResult<InitiationPayload>;

    fn parse_callback(&self, params: &BTreeMap<String, String>) -> CallbackOutcome;

    fn name(&self) -> GatewayName;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::CustomerContact;

    struct MockGateway;

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn build_initiation(
            &self,
            request: InitiationRequest,
        ) -> PaymentResult<InitiationPayload> {
            request.validate_amount()?;
            Ok(InitiationPayload {
                gateway: GatewayName::JazzCash,
                order_ref: "LT-2026-MOCK00001".to_string(),
                destination_url: "https://example.com/pay".to_string(),
                fields: vec![("amount".to_string(), request.amount.to_string())],
                checkout_url: None,
            })
        }

        fn parse_callback(&self, params: &BTreeMap<String, String>) -> CallbackOutcome {
            CallbackOutcome {
                gateway: GatewayName::JazzCash,
                order_ref: params.get("ref").cloned(),
                is_authentic: params.contains_key("sig"),
                is_success: params.get("code").map(|c| c == "000").unwrap_or(false),
                gateway_txn_id: None,
                failure_reason: None,
            }
        }

        fn name(&self) -> GatewayName {
            GatewayName::JazzCash
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_gateway() {
        let gateway: Box<dyn PaymentGateway> = Box::new(MockGateway);
        let payload = gateway
            .build_initiation(InitiationRequest {
                order_ref: None,
                amount: 2700,
                customer: CustomerContact {
                    email: Some("parent@example.com".to_string()),
                    phone: Some("03001234567".to_string()),
                },
                description: "Little Threads order".to_string(),
            })
            .await
            .expect("initiation should succeed");
        assert_eq!(payload.destination_url, "https://example.com/pay");

        let outcome = gateway.parse_callback(&BTreeMap::new());
        assert!(!outcome.is_authentic);
    }
}
