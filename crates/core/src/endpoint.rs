//! Canonical endpoint identities
//!
//! Two configurations may spell the same endpoint differently
//! (`https://S3.example.com:443/` vs `https://s3.example.com`). The transfer
//! strategist compares canonical forms to decide whether a server-side copy
//! is possible.

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// Normalized `scheme://host[:port][/path]` string identifying an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointIdentity(String);

impl EndpointIdentity {
    /// Parse and canonicalize an endpoint URL
    ///
    /// Scheme and host are lower-cased, the scheme's default port is dropped
    /// and trailing slashes are removed. A bare host gets `https://`.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let trimmed = endpoint.trim();
        if trimmed.is_empty() {
            return Err(Error::Configuration("endpoint is empty".to_string()));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| Error::Configuration(format!("invalid endpoint '{endpoint}': {e}")))?;

        let host = url
            .host_str()
            .ok_or_else(|| Error::Configuration(format!("endpoint '{endpoint}' has no host")))?
            .to_ascii_lowercase();

        // Url::port() already returns None for the scheme's default port
        let mut canonical = format!("{}://{}", url.scheme(), host);
        if let Some(port) = url.port() {
            canonical.push_str(&format!(":{port}"));
        }

        let path = url.path().trim_end_matches('/');
        if !path.is_empty() {
            canonical.push_str(path);
        }

        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
