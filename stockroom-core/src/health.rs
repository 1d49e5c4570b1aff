//! Health reporting for the durable store and availability cache.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a backend answered its health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check result for one backend, e.g. `inventory_store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub component: String,
    /// Failure reason; unset when healthy
    pub message: Option<String>,
    /// Backend-specific figures such as entry counts
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheck {
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            component: component.into(),
            message: None,
            metadata: None,
        }
    }

    pub fn unhealthy(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            component: component.into(),
            message: Some(reason.into()),
            metadata: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Attach one metadata figure, replacing any earlier value for `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_carries_reason() {
        assert!(HealthCheck::healthy("inventory_store").is_healthy());

        let down = HealthCheck::unhealthy("availability_cache", "lock poisoned");
        assert!(!down.is_healthy());
        assert_eq!(down.message.as_deref(), Some("lock poisoned"));
    }

    #[test]
    fn test_metadata_keys_overwrite() {
        let check = HealthCheck::healthy("availability_cache")
            .with_metadata("entries", serde_json::json!(3))
            .with_metadata("entries", serde_json::json!(4))
            .with_metadata("backend", serde_json::json!("lmdb"));
        let metadata = check.metadata.expect("metadata present");
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["entries"], serde_json::json!(4));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy).expect("serialize");
        assert_eq!(json, "\"unhealthy\"");
    }
}
