//! # Client Configuration
//!
//! Configuration for the dispatch core: client behaviour, default policy
//! values, transaction capacities and logging.
//!
//! Layering (lowest to highest precedence):
//! 1. Default values
//! 2. Config file (`./dispatch-core.toml`, or an explicit path)
//! 3. Environment variables prefixed `DISPATCH`, sections separated by `__`
//!    (e.g. `DISPATCH_TRANSACTIONS__DEFAULT_READS_CAPACITY=64`)

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};

/// Default config file looked up by [`ClientConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "dispatch-core.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DISPATCH";

/// Dispatch core configuration
///
/// # Examples
///
/// ```rust
/// use dispatch_core::config::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.transactions.default_reads_capacity, 128);
/// assert!(!config.client.capture_stack_traces);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client: ClientSettings,
    pub policies: PolicyDefaults,
    pub transactions: TransactionConfig,
    pub logging: LoggingConfig,
}

/// Command execution behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Capture the call site of every command so errors carry a stack rooted there
    pub capture_stack_traces: bool,
    /// Refuse to dispatch while the transport reports no connection
    pub require_connection: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            capture_stack_traces: false,
            require_connection: true,
        }
    }
}

/// Values applied to policies that leave them unset. Passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDefaults {
    pub total_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Multi-record transaction defaults and pool budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub default_reads_capacity: u32,
    pub default_writes_capacity: u32,
    /// Transaction deadline in seconds; 0 uses the server default
    pub default_timeout_secs: u32,
    /// Upper bound on capacity reserved by live transactions; `None` is unbounded
    pub max_reserved_capacity: Option<u64>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_reads_capacity: 128,
            default_writes_capacity: 128,
            default_timeout_secs: 0,
            max_reserved_capacity: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Explicit filter directive; overrides the environment based level
    pub level: Option<String>,
}

impl ClientConfig {
    /// Load from `./dispatch-core.toml` (if present) and the environment.
    pub fn load() -> DispatchResult<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load from a specific file (optional) and the environment.
    pub fn load_from(path: &Path) -> DispatchResult<Self> {
        debug!(path = %path.display(), "Loading dispatch configuration");

        let config: Self = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!(?config, "Loaded dispatch configuration");
        Ok(config)
    }

    /// Reject values no transaction could be created with.
    pub fn validate(&self) -> DispatchResult<()> {
        let txn = &self.transactions;
        if txn.max_reserved_capacity == Some(0) {
            return Err(DispatchError::Configuration(
                "transactions.max_reserved_capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(budget) = txn.max_reserved_capacity {
            let defaults =
                u64::from(txn.default_reads_capacity) + u64::from(txn.default_writes_capacity);
            if defaults > budget {
                return Err(DispatchError::Configuration(format!(
                    "default transaction capacity {defaults} exceeds max_reserved_capacity {budget}"
                )));
            }
        }
        Ok(())
    }
}
