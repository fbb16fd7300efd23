//! # Runtime Configuration Module
//!
//! Environment-driven switches for schema compilation and the request
//! pipeline.
//!
//! ## Environment Variables
//!
//! | Variable                  | Default | Effect                                        |
//! |---------------------------|---------|-----------------------------------------------|
//! | `OAPI_FETCH_TIMEOUT_SECS` | `10`    | Timeout for each remote `$ref` fetch          |
//! | `OAPI_ALLOW_REMOTE_REFS`  | `true`  | `false` rejects `http(s)` references          |
//! | `OAPI_ASSERT_FORMATS`     | `true`  | `false` treats `format` as annotation only    |
//! | `OAPI_VALIDATE_RESPONSES` | `true`  | `false` skips the response contract check     |
//!
//! Booleans accept `1/0`, `true/false`, `yes/no`, `on/off`. Unparseable
//! values fall back to the default.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oapi_contract::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! let options = CompileOptions::from_runtime(&config);
//! ```

use std::env;
use std::time::Duration;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub fetch_timeout: Duration,
    pub allow_remote_refs: bool,
    pub assert_formats: bool,
    pub validate_responses: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            allow_remote_refs: true,
            assert_formats: true,
            validate_responses: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let fetch_timeout = lookup("OAPI_FETCH_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        };
        RuntimeConfig {
            fetch_timeout,
            allow_remote_refs: flag("OAPI_ALLOW_REMOTE_REFS", defaults.allow_remote_refs),
            assert_formats: flag("OAPI_ASSERT_FORMATS", defaults.assert_formats),
            validate_responses: flag("OAPI_VALIDATE_RESPONSES", defaults.validate_responses),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
