//! Error and warning types
//!
//! Timing calls never return errors. Misuse is rendered through [`Misuse`]
//! and reported to the diagnostics sink. Setup code (settings files,
//! scenario files) returns the `Result` types below.

use thiserror::Error;
use uuid::Uuid;

/// Misuse of the timing API, reported as a warning and otherwise ignored
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Misuse {
    #[error("An event with name {0} has already been created.")]
    AlreadyCreated(String),

    #[error("An event with name {0} has NOT been created. Use the record method to create it.")]
    NotCreated(String),

    #[error("An event with name {0} has not been stopped yet.")]
    NotStopped(String),

    #[error("Session {session} is closed; ignoring {op} of event {name}.")]
    SessionClosed {
        session: Uuid,
        op: &'static str,
        name: String,
    },
}

/// Errors loading tracker settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value} (expected {expected})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Errors loading or replaying a scenario
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Response operation {0} is not supported by the scenario response")]
    Unsupported(&'static str),

    #[error("Response operation {0} failed")]
    Failed(&'static str),
}

/// Result type for settings loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
