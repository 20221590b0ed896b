//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Instant;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
    Disabled,
}

pub async fn check_health(db_pool: Option<&PgPool>) -> HealthStatus {
    let mut checks = HashMap::new();

    let database = match db_pool {
        Some(pool) => {
            let started = Instant::now();
            match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => ComponentHealth {
                    status: ComponentState::Up,
                    response_time_ms: Some(started.elapsed().as_millis()),
                    details: None,
                },
                Err(e) => ComponentHealth {
                    status: ComponentState::Down,
                    response_time_ms: Some(started.elapsed().as_millis()),
                    details: Some(e.to_string()),
                },
            }
        }
        None => ComponentHealth {
            status: ComponentState::Disabled,
            response_time_ms: None,
            details: Some("running on the in-memory order store".to_string()),
        },
    };

    let status = if database.status == ComponentState::Down {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    };
    checks.insert("database".to_string(), database);

    HealthStatus {
        status,
        checks,
        timestamp: chrono::Utc::now(),
    }
}
