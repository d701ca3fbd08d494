//! Typed session and event records
//!
//! [`SessionData`] is what `get_data()` hands back: the request identity,
//! the session's own start/stop stamps, and every named event recorded
//! against it.

use crate::clock::{elapsed_ms, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Accepting `record`/`stop` calls
    #[default]
    Open,
    /// Finalized by the first `end_request`
    Closed,
}

/// A named sub-interval of a session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
}

impl EventRecord {
    pub fn started(at: Timestamp) -> Self {
        Self {
            start_time: Some(at),
            ..Default::default()
        }
    }

    /// Stamp the stop time and compute the elapsed duration
    pub fn finish(&mut self, at: Timestamp) -> f64 {
        self.stop_time = Some(at);
        let elapsed = elapsed_ms(self.start_time, self.stop_time);
        self.elapsed_ms = Some(elapsed);
        elapsed
    }

    pub fn is_stopped(&self) -> bool {
        self.elapsed_ms.is_some()
    }
}

/// Timing record for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub id: Uuid,
    pub url: String,
    pub method: String,
    pub start_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_elapsed_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, EventRecord>,
    #[serde(default)]
    pub state: SessionState,
}

impl SessionData {
    pub fn new(id: Uuid, method: &str, url: &str, start_time: Timestamp) -> Self {
        Self {
            id,
            url: url.to_string(),
            method: method.to_string(),
            start_time,
            stop_time: None,
            total_elapsed_ms: None,
            events: BTreeMap::new(),
            state: SessionState::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn event(&self, name: &str) -> Option<&EventRecord> {
        self.events.get(name)
    }

    /// Stamp the session stop time and total duration, closing it
    pub(crate) fn close(&mut self, at: Timestamp) {
        self.stop_time = Some(at);
        self.total_elapsed_ms = Some(elapsed_ms(Some(self.start_time), self.stop_time));
        self.state = SessionState::Closed;
    }

    /// Render stopped events and the total as a `Server-Timing` header value
    ///
    /// Unstopped events are skipped; the `total` entry appears once the
    /// session is finalized.
    ///
    /// # Example
    /// ```
    /// use reqtime::clock::Timestamp;
    /// use reqtime::session::{EventRecord, SessionData};
    /// use uuid::Uuid;
    ///
    /// let mut data = SessionData::new(Uuid::nil(), "GET", "/", Timestamp::from_nanos(0));
    /// let mut db = EventRecord::started(Timestamp::from_nanos(0));
    /// db.finish(Timestamp::from_nanos(5_000_000));
    /// data.events.insert("db".to_string(), db);
    /// assert_eq!(data.server_timing(), "db;dur=5.0");
    /// ```
    pub fn server_timing(&self) -> String {
        let mut parts: Vec<String> = self
            .events
            .iter()
            .filter_map(|(name, event)| {
                event
                    .elapsed_ms
                    .map(|ms| format!("{};dur={:.1}", metric_name(name), ms))
            })
            .collect();

        if let Some(total) = self.total_elapsed_ms {
            parts.push(format!("total;dur={:.1}", total));
        }
        parts.join(", ")
    }
}

// Server-Timing metric names are HTTP tokens
fn metric_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl fmt::Display for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} [{}]", self.method, self.url, self.id)?;
        for (name, event) in &self.events {
            match event.elapsed_ms {
                Some(ms) => writeln!(f, "  {:20} {:>10.3}ms", name, ms)?,
                None => writeln!(f, "  {:20} {:>12}", name, "(running)")?,
            }
        }
        match self.total_elapsed_ms {
            Some(total) => write!(f, "  {:20} {:>10.3}ms", "total", total),
            None => write!(f, "  {:20} {:>12}", "total", "(open)"),
        }
    }
}
