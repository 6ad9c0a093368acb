//! Client configuration.
//!
//! `TableConfig` is resolved once, normally at process entry, and handed to
//! `TableClient`. The client itself never reads the environment.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{ClientError, Result};

/// Environment variable holding the base identifier.
pub const BASE_ENV: &str = "AIRTABLE_BASE";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "AIRTABLE_API_KEY";
/// Upstream host used when no endpoint override is given.
pub const DEFAULT_ENDPOINT: &str = "https://api.airtable.com";

/// Base identifier, credential and endpoint of one upstream database.
#[derive(Debug, Clone)]
pub struct TableConfig {
    base_id: String,
    api_key: SecretString,
    endpoint: String,
}

impl TableConfig {
    pub fn new(base_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            api_key: SecretString::from(api_key.into()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Resolves each value independently: the explicit argument wins, then
    /// `lookup` is asked for the matching environment variable. Empty values
    /// count as missing.
    pub fn resolve<F>(base_id: Option<String>, api_key: Option<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = pick(api_key, &lookup, API_KEY_ENV).ok_or(ClientError::Configuration {
            name: "API key",
            env: API_KEY_ENV,
        })?;
        let base_id = pick(base_id, &lookup, BASE_ENV).ok_or(ClientError::Configuration {
            name: "base identifier",
            env: BASE_ENV,
        })?;
        Ok(Self::new(base_id, api_key))
    }

    /// `resolve` backed by the process environment.
    pub fn from_env(base_id: Option<String>, api_key: Option<String>) -> Result<Self> {
        Self::resolve(base_id, api_key, |name| std::env::var(name).ok())
    }

    /// Points the client at another host, e.g. a local mock server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Root of the table API for this base: `<endpoint>/v0/<base_id>`.
    pub fn base_url(&self) -> String {
        format!("{}/v0/{}", self.endpoint, self.base_id)
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}

fn pick<F>(explicit: Option<String>, lookup: &F, env: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .filter(|value| !value.is_empty())
        .or_else(|| lookup(env).filter(|value| !value.is_empty()))
}
