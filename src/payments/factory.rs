use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::gateways::{EasyPaisaGateway, JazzCashGateway, SafePayGateway};
use crate::payments::types::GatewayName;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct GatewayRegistryConfig {
    pub enabled_gateways: Vec<GatewayName>,
}

impl GatewayRegistryConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let enabled_raw = std::env::var("ENABLED_GATEWAYS")
            .unwrap_or_else(|_| "jazzcash,easypaisa,safepay".to_string());
        let mut enabled_gateways = Vec::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            enabled_gateways.push(GatewayName::from_str(value)?);
        }

        Ok(Self { enabled_gateways })
    }
}

/// Adapter lookup seam. The checkout service depends on this trait so tests
/// can wire adapters with explicit configs instead of process environment.
pub trait ResolveGateway: Send + Sync {
    fn resolve(&self, gateway: GatewayName) -> PaymentResult<Box<dyn PaymentGateway>>;
}

/// Looks up the adapter for a gateway by name.
///
/// Adapters are constructed per request from their own environment so a
/// misconfigured gateway fails its own initiation with a clear error
/// instead of poisoning service startup.
pub struct GatewayRegistry {
    config: GatewayRegistryConfig,
}

impl GatewayRegistry {
    pub fn from_env() -> PaymentResult<Self> {
        let config = GatewayRegistryConfig::from_env()?;
        Ok(Self { config })
    }

    pub fn with_config(config: GatewayRegistryConfig) -> Self {
        Self { config }
    }

    pub fn get(&self, gateway: GatewayName) -> PaymentResult<Box<dyn PaymentGateway>> {
        if !self.config.enabled_gateways.contains(&gateway) {
            return Err(PaymentError::ValidationError {
                message: format!("gateway {} is disabled", gateway),
                field: Some("gateway".to_string()),
            });
        }

        match gateway {
            GatewayName::JazzCash => Ok(Box::new(JazzCashGateway::from_env()?)),
            GatewayName::EasyPaisa => Ok(Box::new(EasyPaisaGateway::from_env()?)),
            GatewayName::SafePay => Ok(Box::new(SafePayGateway::from_env()?)),
        }
    }

    pub fn list_enabled(&self) -> Vec<GatewayName> {
        self.config.enabled_gateways.clone()
    }
}

impl ResolveGateway for GatewayRegistry {
    fn resolve(&self, gateway: GatewayName) -> PaymentResult<Box<dyn PaymentGateway>> {
        self.get(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gateway_is_rejected() {
        let registry = GatewayRegistry::with_config(GatewayRegistryConfig {
            enabled_gateways: vec![GatewayName::JazzCash],
        });
        assert!(registry.get(GatewayName::SafePay).is_err());
        assert_eq!(registry.list_enabled(), vec![GatewayName::JazzCash]);
    }
}
