//! Service-key helpers and the authentication debugger.
//!
//! The backend accepts the service role key in an `apikey` header, a bearer
//! token, or both. When a run fails with 401 the debugger tries each
//! combination in turn and reports which one the project accepts.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CheckerError, Result};
use crate::rest::{AuthMethod, RestClient};
use crate::schema;

/// Trim a pasted key and drop embedded line breaks.
#[must_use]
pub fn clean_key(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Decode the payload segment of a JWT without verifying it.
#[must_use]
pub fn decode_jwt_payload(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    // Tolerate padded segments.
    let payload = parts[1].trim_end_matches('=');
    let decoded = match URL_SAFE_NO_PAD.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "JWT payload is not base64url");
            return None;
        },
    };

    serde_json::from_slice(&decoded).ok()
}

/// Result of one request made by the debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 200 with this many rows
    Success(usize),
    /// 401
    Unauthorized,
    /// 404
    NotFound,
    /// Any other status or transport failure
    Error(String),
}

impl ProbeOutcome {
    /// Whether the request succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    fn from_result(result: Result<usize>) -> Self {
        match result {
            Ok(rows) => Self::Success(rows),
            Err(CheckerError::Unauthorized(_)) => Self::Unauthorized,
            Err(CheckerError::TableNotFound(_)) => Self::NotFound,
            Err(CheckerError::Status { status, body, .. }) => {
                Self::Error(format!("HTTP {status}: {}", crate::utils::truncate_string(&body, 200)))
            },
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

/// Outcome of trying one header combination
#[derive(Debug, Clone)]
pub struct AuthProbe {
    /// Header combination tried
    pub method: AuthMethod,
    /// What the backend answered
    pub outcome: ProbeOutcome,
}

/// Full debugger report
#[derive(Debug, Clone)]
pub struct AuthReport {
    /// Decoded JWT claims, if the key is a JWT
    pub claims: Option<Value>,
    /// Attempts in the order they were made
    pub probes: Vec<AuthProbe>,
    /// Table access with the first working method
    pub tables: Vec<(String, ProbeOutcome)>,
}

impl AuthReport {
    /// First header combination the backend accepted
    #[must_use]
    pub fn working_method(&self) -> Option<AuthMethod> {
        self.probes.iter().find(|p| p.outcome.is_success()).map(|p| p.method)
    }
}

/// Try each header combination in turn, stopping at the first success.
///
/// Returns every attempt made and a client configured with the working
/// combination, if any.
pub async fn probe_auth_methods(
    base_url: &str,
    service_key: &str,
    timeout: Duration,
) -> Result<(Vec<AuthProbe>, Option<RestClient>)> {
    let mut probes = Vec::new();
    for method in AuthMethod::ALL {
        let client = RestClient::new(base_url, service_key, timeout)?.with_auth_method(method);
        let outcome = ProbeOutcome::from_result(client.probe(schema::videos::TABLE).await);
        info!(method = method.describe(), outcome = ?outcome, "Auth probe");

        let success = outcome.is_success();
        probes.push(AuthProbe { method, outcome });
        if success {
            return Ok((probes, Some(client)));
        }
    }
    Ok((probes, None))
}

/// Check read access to each audited table.
pub async fn probe_tables(client: &RestClient) -> Vec<(String, ProbeOutcome)> {
    let mut tables = Vec::with_capacity(schema::PROBED_TABLES.len());
    for table in schema::PROBED_TABLES {
        let outcome = ProbeOutcome::from_result(client.probe(table).await);
        tables.push((table.to_string(), outcome));
    }
    tables
}

/// Decode the key, find a working header combination, then probe tables.
pub async fn debug_auth(base_url: &str, service_key: &str, timeout: Duration) -> Result<AuthReport> {
    let claims = decode_jwt_payload(service_key);
    if let Some(role) = claims.as_ref().and_then(|c| c.get("role")).and_then(Value::as_str) {
        info!(role, "Decoded service key");
    }

    let (probes, working) = probe_auth_methods(base_url, service_key, timeout).await?;
    let tables = match working {
        Some(client) => probe_tables(&client).await,
        None => Vec::new(),
    };

    Ok(AuthReport { claims, probes, tables })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_key() {
        assert_eq!(clean_key("  eyJa\r\nbc.def\n "), "eyJabc.def");
    }

    #[test]
    fn test_decode_jwt_payload() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"role":"service_role","iss":"supabase"}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.signature");
        let claims = decode_jwt_payload(&token).unwrap();
        assert_eq!(claims["role"], "service_role");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_jwt_payload("not-a-jwt").is_none());
        assert!(decode_jwt_payload("a.!!!.c").is_none());
    }
}
