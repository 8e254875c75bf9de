//! Endpoint configuration: symbolic service name to `{host, port, path}`.
//!
//! # Design
//! The embedding application loads this once at startup and shares it
//! read-only (usually behind an `Arc`). The JSON form mirrors the legacy
//! per-service YAML file, so a port may be written either as a string or as
//! a number.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AtomicsError;

/// Location of one remote query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(deserialize_with = "port_as_string")]
    pub port: String,
    /// Request path including its own leading query parameters,
    /// e.g. `/jAtomics/select/?version=1`.
    pub path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: impl ToString, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.to_string(),
            path: path.into(),
        }
    }
}

/// Service name to endpoint mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoints {
    services: BTreeMap<String, Endpoint>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the endpoint for `service`. Builder-style.
    pub fn insert(mut self, service: impl Into<String>, endpoint: Endpoint) -> Self {
        self.services.insert(service.into(), endpoint);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AtomicsError> {
        serde_json::from_str(raw).map_err(|e| AtomicsError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AtomicsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AtomicsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Look up `service`, failing with `UnknownService` when absent.
    pub fn get(&self, service: &str) -> Result<&Endpoint, AtomicsError> {
        self.services
            .get(service)
            .ok_or_else(|| AtomicsError::UnknownService(service.to_string()))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn port_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s,
        Port::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_legacy_shape_from_json() {
        let raw = r#"{
            "hr": { "host": "hr-atomics.newco.com", "port": "8080", "path": "/jAtomics/select/?version=1" },
            "other": { "host": "other-atomics.example.com", "port": 80, "path": "/atomics/raw" }
        }"#;
        let endpoints = Endpoints::from_json_str(raw).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints.get("hr").unwrap().port, "8080");
        assert_eq!(endpoints.get("other").unwrap().port, "80");
        assert_eq!(endpoints.get("other").unwrap().path, "/atomics/raw");
    }

    #[test]
    fn unknown_service_is_a_configuration_error() {
        let endpoints = Endpoints::new().insert("hr", Endpoint::new("localhost", 8080, "/x?v=1"));
        let err = endpoints.get("payroll").unwrap_err();
        assert!(matches!(err, AtomicsError::UnknownService(ref s) if s == "payroll"));
    }

    #[test]
    fn rejects_missing_fields() {
        let err = Endpoints::from_json_str(r#"{"hr": {"host": "h"}}"#).unwrap_err();
        assert!(matches!(err, AtomicsError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = Endpoints::from_path("/nonexistent/atomics.json").unwrap_err();
        assert!(matches!(err, AtomicsError::Config(_)));
    }
}
