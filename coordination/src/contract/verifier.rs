//! Contract Verifier: exercise every declared endpoint over HTTP.

use std::time::Duration;

use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{carries_body, Contract, Endpoint};
use crate::error::CoordinationResult;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Send an `Origin` header and require `access-control-allow-origin`.
    /// Off by default: a 2xx response passes on status alone.
    pub check_cors: bool,
    pub origin: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            check_cors: false,
            origin: "http://localhost:5173".to_string(),
        }
    }
}

/// Outcome of one endpoint call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointResult {
    pub method: String,
    pub path: String,
    pub expected: u16,
    /// Status received, `None` when no response arrived.
    pub actual: Option<u16>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_sent: Option<Value>,
}

impl EndpointResult {
    fn failed(endpoint: &Endpoint, actual: Option<u16>, error: String) -> Self {
        Self {
            method: endpoint.method.clone(),
            path: endpoint.path.clone(),
            expected: endpoint.expect,
            actual,
            ok: false,
            error: Some(error),
            body_sent: endpoint.body.clone(),
        }
    }
}

/// Aggregate verdict for one contract run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub total: usize,
    pub failed: usize,
    pub endpoints: Vec<EndpointResult>,
    /// Contract-level failure not tied to a single endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl VerificationResult {
    /// Failing result carrying only a contract-level reason.
    pub fn failure(note: impl Into<String>) -> Self {
        Self {
            passed: false,
            note: Some(note.into()),
            ..Self::default()
        }
    }

    /// `(method, path)` of every failing endpoint.
    pub fn failing_routes(&self) -> Vec<(String, String)> {
        self.endpoints
            .iter()
            .filter(|e| !e.ok)
            .map(|e| (e.method.clone(), e.path.clone()))
            .collect()
    }

    /// Human-readable failure summary, `None` when passed.
    pub fn diagnostic(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        let mut lines = vec!["Contract tests failed:".to_string()];
        if let Some(note) = &self.note {
            lines.push(note.clone());
        }
        for e in self.endpoints.iter().filter(|e| !e.ok) {
            let reason = e.error.as_deref().unwrap_or("failed");
            lines.push(format!("{} {}: {}", e.method, e.path, reason));
        }
        Some(lines.join("\n"))
    }
}

pub struct ContractVerifier {
    client: reqwest::Client,
    config: VerifierConfig,
}

impl ContractVerifier {
    pub fn new(config: VerifierConfig) -> CoordinationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Call each endpoint once, in contract order. Never retries.
    pub async fn verify(&self, contract: &Contract) -> VerificationResult {
        if contract.is_empty() {
            warn!("contract declares no endpoints");
            return VerificationResult::failure("contract declares no endpoints");
        }

        let mut endpoints = Vec::with_capacity(contract.endpoints.len());
        for endpoint in &contract.endpoints {
            let result = self.call(&contract.base_url, endpoint).await;
            debug!(
                method = %result.method,
                path = %result.path,
                ok = result.ok,
                actual = ?result.actual,
                "endpoint verified"
            );
            endpoints.push(result);
        }

        let failed = endpoints.iter().filter(|e| !e.ok).count();
        info!(total = endpoints.len(), failed, "contract verification finished");
        VerificationResult {
            passed: failed == 0,
            total: endpoints.len(),
            failed,
            endpoints,
            note: None,
        }
    }

    async fn call(&self, base_url: &str, endpoint: &Endpoint) -> EndpointResult {
        let method = match endpoint.method.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return EndpointResult::failed(endpoint, None, format!("unsupported method {other}"))
            }
        };

        let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint.path);
        let mut request = self.client.request(method, &url);
        if self.config.check_cors {
            request = request.header(ORIGIN, &self.config.origin);
        }
        let body_sent = if carries_body(&endpoint.method) {
            let body = endpoint
                .body
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default()));
            request = request.json(&body);
            Some(body)
        } else {
            None
        };

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    "connection refused - server may not be running".to_string()
                } else {
                    format!("request failed: {e}")
                };
                return EndpointResult {
                    body_sent,
                    ..EndpointResult::failed(endpoint, None, reason)
                };
            }
        };

        let status = response.status();
        let actual = Some(status.as_u16());
        let error = if !status.is_success() {
            Some(format!("expected {}, got {}", endpoint.expect, status.as_u16()))
        } else if self.config.check_cors
            && !response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN)
        {
            Some("missing CORS header (access-control-allow-origin)".to_string())
        } else {
            None
        };

        EndpointResult {
            method: endpoint.method.clone(),
            path: endpoint.path.clone(),
            expected: endpoint.expect,
            actual,
            ok: error.is_none(),
            error,
            body_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(method: &str, path: &str, ok: bool, error: Option<&str>) -> EndpointResult {
        EndpointResult {
            method: method.into(),
            path: path.into(),
            expected: 200,
            actual: Some(if ok { 200 } else { 500 }),
            ok,
            error: error.map(String::from),
            body_sent: None,
        }
    }

    #[test]
    fn test_diagnostic_lists_failures() {
        let r = VerificationResult {
            passed: false,
            total: 2,
            failed: 1,
            endpoints: vec![
                result("GET", "/items", true, None),
                result("DELETE", "/delete/1", false, Some("expected 200, got 500")),
            ],
            note: None,
        };
        assert_eq!(
            r.diagnostic().unwrap(),
            "Contract tests failed:\nDELETE /delete/1: expected 200, got 500"
        );
        assert_eq!(
            r.failing_routes(),
            vec![("DELETE".to_string(), "/delete/1".to_string())]
        );
    }

    #[test]
    fn test_passed_has_no_diagnostic() {
        let r = VerificationResult {
            passed: true,
            total: 1,
            failed: 0,
            endpoints: vec![result("GET", "/", true, None)],
            note: None,
        };
        assert_eq!(r.diagnostic(), None);
    }

    #[tokio::test]
    async fn test_empty_contract_fails() {
        let verifier = ContractVerifier::new(VerifierConfig::default()).unwrap();
        let r = verifier.verify(&Contract::new("http://127.0.0.1:1")).await;
        assert!(!r.passed);
        assert!(r.diagnostic().unwrap().contains("contract declares no endpoints"));
    }
}
