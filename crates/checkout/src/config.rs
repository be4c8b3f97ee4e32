//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CHECKOUT_ENCRYPTION_KEY` - base64-encoded 32-byte key for card data encryption
//!
//! ## Optional
//! - `CHECKOUT_ISOLATION` - `serializable` (default) or `read_committed`
//! - `CHECKOUT_TRANSACTION_TIMEOUT_SECS` - per-attempt transaction timeout (default: 10)
//! - `CHECKOUT_MAX_CONNECTIONS` - connection pool size (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! Configuration is built once at startup and handed to the services that
//! need it. Nothing here is global.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

const MIN_ENTROPY_BITS_PER_BYTE: f64 = 3.3;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Checkout application configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How checkout transactions are opened and bounded
    pub transaction: TransactionPolicy,
    /// Card data encryption key
    pub encryption: EncryptionConfig,
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the encryption key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CHECKOUT_DATABASE_URL")?;
        let max_connections = get_env_or_default(
            "CHECKOUT_MAX_CONNECTIONS",
            &DEFAULT_MAX_CONNECTIONS.to_string(),
        )
        .parse::<u32>()
        .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_MAX_CONNECTIONS".to_string(), e.to_string()))?;

        let transaction = TransactionPolicy::from_env()?;
        let encryption = EncryptionConfig::from_env("CHECKOUT_ENCRYPTION_KEY")?;

        Ok(Self {
            database_url,
            max_connections,
            transaction,
            encryption,
        })
    }

    /// Load only the database URL, for tools that never touch card data.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither `CHECKOUT_DATABASE_URL`
    /// nor `DATABASE_URL` is set.
    pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
        let _ = dotenvy::dotenv();
        get_database_url("CHECKOUT_DATABASE_URL")
    }
}

/// Transaction isolation used for checkout transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Conflicting stock reads abort one transaction with a serialization failure.
    #[default]
    Serializable,
    /// Relies on the `FOR UPDATE` row locks taken when reading stock.
    ReadCommitted,
}

impl IsolationLevel {
    /// Statement that applies this level to the current transaction.
    #[must_use]
    pub const fn set_transaction_sql(self) -> &'static str {
        match self {
            Self::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            Self::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serializable" => Ok(Self::Serializable),
            "read_committed" | "read-committed" => Ok(Self::ReadCommitted),
            other => Err(format!("unknown isolation level: {other}")),
        }
    }
}

/// How each checkout transaction is opened and bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionPolicy {
    /// Isolation level applied at `BEGIN`.
    pub isolation: IsolationLevel,
    /// Upper bound on a single attempt. Elapsing rolls the attempt back.
    pub timeout: Duration,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::Serializable,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TransactionPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let isolation = get_env_or_default("CHECKOUT_ISOLATION", "serializable")
            .parse::<IsolationLevel>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_ISOLATION".to_string(), e))?;
        let timeout_secs = get_env_or_default(
            "CHECKOUT_TRANSACTION_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("CHECKOUT_TRANSACTION_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_TRANSACTION_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            isolation,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Symmetric key for card data encryption.
///
/// Implements `Debug` manually to redact the key. Key bytes are zeroed on drop.
#[derive(Clone)]
pub struct EncryptionConfig {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl EncryptionConfig {
    /// Use raw key bytes as-is.
    #[must_use]
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Decode and validate a base64 key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the value is not base64 of
    /// exactly 32 bytes, or `ConfigError::InsecureSecret` if it looks like a
    /// placeholder or has too little entropy.
    pub fn from_base64(encoded: &SecretString, var_name: &str) -> Result<Self, ConfigError> {
        let value = encoded.expose_secret().trim();
        check_placeholder(value, var_name)?;

        let bytes = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(value)
                .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?,
        );
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            ConfigError::InvalidEnvVar(
                var_name.to_string(),
                format!("key must decode to {KEY_LEN} bytes (got {})", bytes.len()),
            )
        })?;

        let entropy = byte_entropy(&key);
        if entropy < MIN_ENTROPY_BITS_PER_BYTE {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!(
                    "entropy too low ({entropy:.2} bits/byte, need >= {MIN_ENTROPY_BITS_PER_BYTE:.1}). Use a randomly generated key."
                ),
            ));
        }

        Ok(Self::from_bytes(key))
    }

    fn from_env(key: &str) -> Result<Self, ConfigError> {
        let value = get_required_env(key)?;
        Self::from_base64(&SecretString::from(value), key)
    }

    pub(crate) fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn check_placeholder(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

/// Shannon entropy in bits per byte.
fn byte_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<u8, usize> = HashMap::new();
    for b in bytes {
        *freq.entry(*b).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // key length is tiny
    let len = bytes.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}
