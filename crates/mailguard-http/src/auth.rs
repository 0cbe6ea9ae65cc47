//! Pre-shared bearer token check.

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use ring::constant_time;

/// The shared secret clients present as `Authorization: Bearer <key>`.
///
/// `Debug` never prints the key.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> anyhow::Result<Self> {
        let key = key.into();
        anyhow::ensure!(!key.trim().is_empty(), "API key must not be empty");
        Ok(Self(key))
    }

    /// True when `headers` carry exactly `Authorization: Bearer <key>`.
    ///
    /// The token comparison runs in constant time for equal-length input.
    pub fn authorizes(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return false;
        };
        let Ok(value) = value.to_str() else {
            return false;
        };
        let Some(token) = value.strip_prefix("Bearer ") else {
            return false;
        };
        constant_time::verify_slices_are_equal(token.as_bytes(), self.0.as_bytes()).is_ok()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
