//! Diagnostics sinks for misuse warnings and event log lines
//!
//! The tracker never writes to stdout/stderr directly. Every message goes
//! through a [`Diagnostics`] implementation injected at construction:
//! [`TracingDiagnostics`] in production, [`MemoryDiagnostics`] when a test
//! needs to assert on what was reported. Each message carries the id of the
//! session that produced it.

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Receiver for tracker output
pub trait Diagnostics: Send + Sync {
    /// Misuse of the timing API (duplicate record, unknown stop, ...)
    fn warn(&self, session: Uuid, message: &str);

    /// Informational event lines (`db: (5.012ms)`)
    fn info(&self, session: Uuid, message: &str);
}

/// Forwards to the `tracing` macros under the `reqtime` target
///
/// The session id is attached as the `session_id` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, session: Uuid, message: &str) {
        tracing::warn!(target: "reqtime", session_id = %session, "{}", message);
    }

    fn info(&self, session: Uuid, message: &str) {
        tracing::info!(target: "reqtime", session_id = %session, "{}", message);
    }
}

/// Severity of a captured message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Info,
}

/// A message captured by [`MemoryDiagnostics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub session: Uuid,
    pub message: String,
}

/// In-memory sink; clones share the same buffer
///
/// # Example
/// ```
/// use reqtime::diagnostics::{Diagnostics, MemoryDiagnostics};
/// use uuid::Uuid;
///
/// let sink = MemoryDiagnostics::new();
/// sink.warn(Uuid::nil(), "careful");
/// assert_eq!(sink.warnings(), vec!["careful".to_string()]);
/// assert_eq!(sink.entries()[0].session, Uuid::nil());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnostics {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured messages in emission order
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(Level::Warn)
    }

    pub fn infos(&self) -> Vec<String> {
        self.messages(Level::Info)
    }

    /// Messages reported by one session
    pub fn for_session(&self, session: Uuid) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.session == session)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }

    fn push(&self, level: Level, session: Uuid, message: &str) {
        self.entries.lock().push(Diagnostic {
            level,
            session,
            message: message.to_string(),
        });
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn warn(&self, session: Uuid, message: &str) {
        self.push(Level::Warn, session, message);
    }

    fn info(&self, session: Uuid, message: &str) {
        self.push(Level::Info, session, message);
    }
}
