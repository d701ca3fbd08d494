//! Tracker configuration
//!
//! [`TrackerConfig`] is the in-code configuration handed to
//! [`RequestTracker`](crate::tracker::RequestTracker). Its serializable
//! subset, [`TrackerSettings`], can be loaded from a TOML file and
//! overridden from the environment.

use crate::error::{ConfigError, ConfigResult};
use crate::session::SessionData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Hook invoked with the finalized session, before any caller callback
pub type EndRequestHook = Arc<dyn Fn(&SessionData) + Send + Sync>;

/// What `record`/`stop` do once a session has been finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosedPolicy {
    /// Warn and leave the session untouched
    #[default]
    Reject,
    /// Keep mutating events; totals stay frozen
    Allow,
}

impl std::str::FromStr for ClosedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "allow" => Ok(Self::Allow),
            other => Err(other.to_string()),
        }
    }
}

/// Tracker configuration
///
/// # Example
/// ```
/// use reqtime::config::TrackerConfig;
///
/// let config = TrackerConfig::default()
///     .verbose(true)
///     .on_end_request(|data| println!("{} took {:?}ms", data.url, data.total_elapsed_ms));
/// assert!(config.is_verbose());
/// ```
#[derive(Clone, Default)]
pub struct TrackerConfig {
    verbose: bool,
    closed_policy: ClosedPolicy,
    on_end_request: Option<EndRequestHook>,
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every successful `stop` as `<name>: (<ms>ms)`
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn closed_policy(mut self, policy: ClosedPolicy) -> Self {
        self.closed_policy = policy;
        self
    }

    pub fn on_end_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SessionData) + Send + Sync + 'static,
    {
        self.on_end_request = Some(Arc::new(hook));
        self
    }

    /// Apply loaded settings, keeping the configured hook
    pub fn with_settings(mut self, settings: &TrackerSettings) -> Self {
        self.verbose = settings.verbose;
        self.closed_policy = settings.closed_policy;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn policy(&self) -> ClosedPolicy {
        self.closed_policy
    }

    pub fn end_request_hook(&self) -> Option<&EndRequestHook> {
        self.on_end_request.as_ref()
    }
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("verbose", &self.verbose)
            .field("closed_policy", &self.closed_policy)
            .field("on_end_request", &self.on_end_request.is_some())
            .finish()
    }
}

/// Serializable tracker settings
///
/// ```toml
/// verbose = true
/// closed_policy = "allow"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub verbose: bool,
    pub closed_policy: ClosedPolicy,
}

pub const ENV_VERBOSE: &str = "REQTIME_VERBOSE";
pub const ENV_CLOSED_POLICY: &str = "REQTIME_CLOSED_POLICY";

impl TrackerSettings {
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Override fields from `REQTIME_VERBOSE` and `REQTIME_CLOSED_POLICY`
    pub fn apply_env(mut self) -> ConfigResult<Self> {
        if let Ok(value) = std::env::var(ENV_VERBOSE) {
            self.verbose = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                var: ENV_VERBOSE,
                value,
                expected: "true or false",
            })?;
        }

        if let Ok(value) = std::env::var(ENV_CLOSED_POLICY) {
            self.closed_policy = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_CLOSED_POLICY,
                value,
                expected: "reject or allow",
            })?;
        }

        Ok(self)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
