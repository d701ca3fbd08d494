//! Per-request timing capability bundle
//!
//! A [`TimingHandle`] is what gets attached to the request. It owns the
//! session through an `Arc`, so clones held by the request and by the
//! wrapped response observe and mutate the same record.

use crate::clock::Clock;
use crate::config::{ClosedPolicy, TrackerConfig};
use crate::diagnostics::Diagnostics;
use crate::error::Misuse;
use crate::session::{EventRecord, SessionData};
use parking_lot::Mutex;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Timing operations for one request
#[derive(Clone)]
pub struct TimingHandle {
    session: Arc<Mutex<SessionData>>,
    id: Uuid,
    config: TrackerConfig,
    diagnostics: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
}

impl TimingHandle {
    pub(crate) fn open(
        method: &str,
        url: &str,
        config: TrackerConfig,
        diagnostics: Arc<dyn Diagnostics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = Uuid::new_v4();
        let data = SessionData::new(id, method, url, clock.now());
        tracing::debug!(session_id = %id, method, url, "timing session opened");

        Self {
            session: Arc::new(Mutex::new(data)),
            id,
            config,
            diagnostics,
            clock,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.session.lock().is_closed()
    }

    /// Start the event `name`
    ///
    /// A name can only be recorded once per session; a repeat keeps the
    /// original start time and warns.
    pub fn record(&self, name: &str) {
        let now = self.clock.now();
        let misuse = {
            let mut session = self.session.lock();
            if let Some(misuse) = self.closed_misuse(&session, "record", name) {
                Some(misuse)
            } else {
                match session.events.entry(name.to_string()) {
                    Entry::Occupied(_) => Some(Misuse::AlreadyCreated(name.to_string())),
                    Entry::Vacant(slot) => {
                        slot.insert(EventRecord::started(now));
                        None
                    }
                }
            }
        };

        match misuse {
            Some(misuse) => self.report(&misuse),
            None => tracing::trace!(session_id = %self.id, event = name, "event recorded"),
        }
    }

    /// Stop the event `name` and compute its elapsed time
    pub fn stop(&self, name: &str) {
        let now = self.clock.now();
        let outcome = {
            let mut session = self.session.lock();
            if let Some(misuse) = self.closed_misuse(&session, "stop", name) {
                Err(misuse)
            } else {
                match session.events.get_mut(name) {
                    Some(event) => Ok(event.finish(now)),
                    None => Err(Misuse::NotCreated(name.to_string())),
                }
            }
        };

        match outcome {
            Ok(elapsed_ms) => {
                tracing::trace!(session_id = %self.id, event = name, elapsed_ms, "event stopped");
                if self.config.is_verbose() {
                    self.log_event(name);
                }
            }
            Err(misuse) => self.report(&misuse),
        }
    }

    /// Finalize the session with no caller callback
    ///
    /// Returns `true` if this call performed the finalization.
    pub fn end_request(&self) -> bool {
        self.finalize(None::<fn(&SessionData)>)
    }

    /// Finalize the session, then run `callback` with the finalized data
    ///
    /// The configured `on_end_request` hook runs before `callback`. Both run
    /// only on the first finalization of the session.
    pub fn end_request_with<F>(&self, callback: F) -> bool
    where
        F: FnOnce(&SessionData),
    {
        self.finalize(Some(callback))
    }

    fn finalize<F>(&self, callback: Option<F>) -> bool
    where
        F: FnOnce(&SessionData),
    {
        let now = self.clock.now();
        let snapshot = {
            let mut session = self.session.lock();
            if session.is_closed() {
                return false;
            }
            session.close(now);
            session.clone()
        };

        tracing::debug!(
            session_id = %self.id,
            total_elapsed_ms = ?snapshot.total_elapsed_ms,
            "timing session closed"
        );

        // Hooks run unlocked so they may call back into the handle
        if let Some(hook) = self.config.end_request_hook() {
            hook(&snapshot);
        }
        if let Some(callback) = callback {
            callback(&snapshot);
        }
        true
    }

    /// Emit `<name>: (<elapsed>ms)` for a stopped event
    pub fn log_event(&self, name: &str) {
        let event = self.session.lock().event(name).copied();
        match event {
            Some(EventRecord {
                elapsed_ms: Some(ms),
                ..
            }) => self
                .diagnostics
                .info(self.id, &format!("{}: ({:.3}ms)", name, ms)),
            Some(_) => self.report(&Misuse::NotStopped(name.to_string())),
            None => self.report(&Misuse::NotCreated(name.to_string())),
        }
    }

    /// Snapshot of the session as of this call
    pub fn get_data(&self) -> SessionData {
        self.session.lock().clone()
    }

    /// `Server-Timing` header value for the current state
    pub fn server_timing(&self) -> String {
        self.session.lock().server_timing()
    }

    fn closed_misuse(&self, session: &SessionData, op: &'static str, name: &str) -> Option<Misuse> {
        if session.is_closed() && self.config.policy() == ClosedPolicy::Reject {
            Some(Misuse::SessionClosed {
                session: self.id,
                op,
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    fn report(&self, misuse: &Misuse) {
        self.diagnostics.warn(self.id, &misuse.to_string());
    }
}

impl fmt::Debug for TimingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingHandle")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::diagnostics::MemoryDiagnostics;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn handle_with(config: TrackerConfig) -> (TimingHandle, ManualClock, MemoryDiagnostics) {
        let clock = ManualClock::new();
        let sink = MemoryDiagnostics::new();
        let handle = TimingHandle::open(
            "GET",
            "/items/42",
            config,
            Arc::new(sink.clone()),
            Arc::new(clock.clone()),
        );
        (handle, clock, sink)
    }

    #[test]
    fn test_record_then_stop_measures_interval() {
        let (handle, clock, sink) = handle_with(TrackerConfig::default());
        handle.record("db");
        clock.advance(Duration::from_millis(5));
        handle.stop("db");

        let data = handle.get_data();
        assert_eq!(data.event("db").unwrap().elapsed_ms, Some(5.0));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_duplicate_record_keeps_first_start() {
        let (handle, clock, sink) = handle_with(TrackerConfig::default());
        handle.record("cache");
        let first = handle.get_data().event("cache").unwrap().start_time;

        clock.advance(Duration::from_millis(3));
        handle.record("cache");

        assert_eq!(handle.get_data().event("cache").unwrap().start_time, first);
        assert_eq!(
            sink.warnings(),
            vec!["An event with name cache has already been created."]
        );

        clock.advance(Duration::from_millis(2));
        handle.stop("cache");
        assert_eq!(handle.get_data().event("cache").unwrap().elapsed_ms, Some(5.0));
    }

    #[test]
    fn test_stop_unknown_event_warns() {
        let (handle, _clock, sink) = handle_with(TrackerConfig::default().verbose(true));
        handle.stop("ghost");

        assert!(handle.get_data().events.is_empty());
        assert_eq!(sink.warnings().len(), 1);
        assert!(sink.warnings()[0].contains("has NOT been created"));
        assert!(sink.infos().is_empty());
    }

    #[test]
    fn test_verbose_stop_logs_event() {
        let (handle, clock, sink) = handle_with(TrackerConfig::default().verbose(true));
        handle.record("render");
        clock.advance(Duration::from_micros(2500));
        handle.stop("render");

        assert_eq!(sink.infos(), vec!["render: (2.500ms)"]);
    }

    #[test]
    fn test_diagnostics_carry_session_id() {
        let (handle, _clock, sink) = handle_with(TrackerConfig::default().verbose(true));
        handle.record("db");
        handle.stop("db");
        handle.stop("ghost");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|d| d.session == handle.id()));
    }

    #[test]
    fn test_quiet_stop_logs_nothing() {
        let (handle, _clock, sink) = handle_with(TrackerConfig::default());
        handle.record("render");
        handle.stop("render");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_repeated_stop_restamps() {
        let (handle, clock, _sink) = handle_with(TrackerConfig::default());
        handle.record("io");
        clock.advance(Duration::from_millis(1));
        handle.stop("io");
        clock.advance(Duration::from_millis(1));
        handle.stop("io");
        assert_eq!(handle.get_data().event("io").unwrap().elapsed_ms, Some(2.0));
    }

    #[test]
    fn test_log_event_unstopped_warns_without_duration() {
        let (handle, _clock, sink) = handle_with(TrackerConfig::default());
        handle.record("db");
        handle.log_event("db");

        assert!(sink.infos().is_empty());
        assert_eq!(
            sink.warnings(),
            vec!["An event with name db has not been stopped yet."]
        );
    }

    #[test]
    fn test_log_event_unknown_warns() {
        let (handle, _clock, sink) = handle_with(TrackerConfig::default());
        handle.log_event("missing");
        assert!(sink.warnings()[0].contains("has NOT been created"));
    }

    #[test]
    fn test_end_request_runs_once_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let hook_order = Arc::clone(&order);
        let config = TrackerConfig::default().on_end_request(move |_| hook_order.lock().push("hook"));
        let (handle, clock, sink) = handle_with(config);

        clock.advance(Duration::from_millis(7));
        let cb_order = Arc::clone(&order);
        assert!(handle.end_request_with(move |data| {
            assert_eq!(data.total_elapsed_ms, Some(7.0));
            cb_order.lock().push("callback");
        }));

        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            assert!(!handle.end_request_with(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(!handle.end_request());

        assert_eq!(*order.lock(), vec!["hook", "callback"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_end_request_freezes_total() {
        let (handle, clock, _sink) = handle_with(TrackerConfig::default());
        clock.advance(Duration::from_millis(4));
        handle.end_request();
        clock.advance(Duration::from_millis(10));
        handle.end_request();

        let data = handle.get_data();
        assert!(data.is_closed());
        assert_eq!(data.total_elapsed_ms, Some(4.0));
    }

    #[test]
    fn test_hook_may_reenter_handle() {
        let slot: Arc<Mutex<Option<TimingHandle>>> = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&slot);
        let config = TrackerConfig::default().on_end_request(move |_| {
            if let Some(handle) = seen.lock().as_ref() {
                assert!(handle.get_data().is_closed());
            }
        });
        let (handle, _clock, _sink) = handle_with(config);
        *slot.lock() = Some(handle.clone());

        assert!(handle.end_request());
    }

    #[test]
    fn test_closed_session_rejects_mutation() {
        let (handle, _clock, sink) = handle_with(TrackerConfig::default());
        handle.record("early");
        handle.end_request();

        handle.record("late");
        handle.stop("early");

        let data = handle.get_data();
        assert!(data.event("late").is_none());
        assert!(!data.event("early").unwrap().is_stopped());
        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("ignoring record of event late"));
        assert!(warnings[1].contains("ignoring stop of event early"));
    }

    #[test]
    fn test_closed_session_allows_mutation_when_configured() {
        let config = TrackerConfig::default().closed_policy(ClosedPolicy::Allow);
        let (handle, clock, sink) = handle_with(config);
        clock.advance(Duration::from_millis(1));
        handle.end_request();

        handle.record("late");
        clock.advance(Duration::from_millis(2));
        handle.stop("late");

        let data = handle.get_data();
        assert_eq!(data.event("late").unwrap().elapsed_ms, Some(2.0));
        assert_eq!(data.total_elapsed_ms, Some(1.0));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_fresh_session_has_no_events() {
        let (handle, _clock, _sink) = handle_with(TrackerConfig::default());
        let data = handle.get_data();
        assert_eq!(data.id, handle.id());
        assert_eq!(data.method, "GET");
        assert_eq!(data.url, "/items/42");
        assert!(data.events.is_empty());
        assert!(data.stop_time.is_none());
        assert!(!handle.is_closed());
    }

    #[test]
    fn test_clones_share_session() {
        let (handle, _clock, _sink) = handle_with(TrackerConfig::default());
        let other = handle.clone();
        other.record("shared");
        assert!(handle.get_data().event("shared").is_some());
        assert_eq!(other.id(), handle.id());
    }
}
