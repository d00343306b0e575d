//! Configuration loading and validation for the gateway.
//!
//! All values are read from environment variables at startup. Optional
//! features (crypto routes, signing, token verification, TLS, OTLP export)
//! are switched on by the presence of their variables; a missing
//! `ENCRYPTION_SECRET` is reported per request, not at startup.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::auth::firebase::DEFAULT_JWKS_URL;
use crate::crypto::Secret;
use crate::server::middleware::REQUEST_TIMEOUT;

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP(S) server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Shared secret from which the envelope key is derived.
    #[serde(default)]
    pub encryption_secret: Option<Secret>,

    /// Starknet JSON-RPC endpoint. Signing is disabled when absent.
    #[serde(default)]
    pub starknet_rpc_url: Option<String>,

    /// Chain id as hex felt or short string; fetched from the RPC when absent.
    #[serde(default)]
    pub starknet_chain_id: Option<String>,

    /// Upper bound on one signing round-trip, in seconds.
    #[serde(default = "default_signing_timeout")]
    pub signing_timeout_secs: u64,

    /// Firebase project id. `/verify` is disabled when absent.
    #[serde(default)]
    pub firebase_project_id: Option<String>,

    /// JWKS endpoint for Firebase ID token keys.
    #[serde(default = "default_firebase_jwks_url")]
    pub firebase_jwks_url: String,

    /// How long a fetched JWKS is trusted before refetching, in seconds.
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,

    /// Minimum spacing between JWKS fetches, in seconds.
    #[serde(default = "default_jwks_min_refresh")]
    pub jwks_min_refresh_secs: u64,

    /// PEM certificate chain. TLS is enabled when this and `tls_key_path` are set.
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// PEM private key for TLS.
    #[serde(default)]
    pub tls_key_path: Option<String>,

    /// OTLP endpoint for span export. Logs only when absent.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_signing_timeout() -> u64 {
    30
}
fn default_firebase_jwks_url() -> String {
    DEFAULT_JWKS_URL.into()
}
fn default_jwks_cache_ttl() -> u64 {
    300
}
fn default_jwks_min_refresh() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().ignore_empty(true))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.signing_timeout_secs == 0 {
            anyhow::bail!("SIGNING_TIMEOUT_SECS must be > 0");
        }
        if self.signing_timeout_secs >= REQUEST_TIMEOUT.as_secs() {
            anyhow::bail!(
                "SIGNING_TIMEOUT_SECS must be below the {}s request timeout",
                REQUEST_TIMEOUT.as_secs()
            );
        }
        if self.firebase_jwks_url.trim().is_empty() {
            anyhow::bail!("FIREBASE_JWKS_URL must not be empty");
        }
        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            anyhow::bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together");
        }
        Ok(())
    }

    /// The encryption secret, unless unset or blank.
    pub fn secret(&self) -> Option<&Secret> {
        self.encryption_secret.as_ref().filter(|s| !s.is_blank())
    }

    /// Certificate and key paths when TLS is configured.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        self.tls_cert_path.as_deref().zip(self.tls_key_path.as_deref())
    }
}
