//! Credential injection for feed providers.
//!
//! Providers never hold an API key in source. They hold a
//! [`CredentialProvider`] and resolve the key on every request, so a rotated
//! key is picked up without rebuilding the fetcher.

use std::fmt;

use crate::errors::FeedError;

/// Default environment variable holding the Polygon API key.
pub const POLYGON_API_KEY_VAR: &str = "POLYGON_API_KEY";

/// Resolves the credential a provider needs at call time.
pub trait CredentialProvider: Send + Sync {
    /// Name of the credential, used in logs and errors. Never the value.
    fn name(&self) -> &str;

    /// Resolve the current secret value.
    fn api_key(&self) -> Result<String, FeedError>;
}

/// Reads the credential from an environment variable on every call.
#[derive(Clone, Debug)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Provider for [`POLYGON_API_KEY_VAR`].
    pub fn polygon() -> Self {
        Self::new(POLYGON_API_KEY_VAR)
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn name(&self) -> &str {
        &self.var
    }

    fn api_key(&self) -> Result<String, FeedError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(FeedError::MissingCredential {
                name: self.var.clone(),
            }),
        }
    }
}

/// A credential handed over by the host, e.g. from a secret manager.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    name: String,
    value: String,
}

impl StaticCredentialProvider {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// The secret value must never reach logs.
impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn api_key(&self) -> Result<String, FeedError> {
        if self.value.trim().is_empty() {
            return Err(FeedError::MissingCredential {
                name: self.name.clone(),
            });
        }
        Ok(self.value.clone())
    }
}
