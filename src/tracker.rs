//! Request timing tracker
//!
//! One [`RequestTracker`] per process. It holds the read-only configuration,
//! the diagnostics sink and the clock, and produces a fresh timing session
//! for every request it intercepts.
//!
//! # Example
//! ```
//! use reqtime::response::ResponseSurface;
//! use reqtime::scenario::{RecordingResponse, ScenarioRequest};
//! use reqtime::request::Instrumentable;
//! use reqtime::{RequestTracker, TrackerConfig};
//!
//! let tracker = RequestTracker::new(TrackerConfig::default());
//! let mut req = ScenarioRequest::new("GET", "/items/42");
//!
//! tracker.intercept(&mut req, RecordingResponse::new(), |req, mut res| {
//!     let timing = req.timing().unwrap();
//!     timing.record("db");
//!     timing.stop("db");
//!     res.json(&serde_json::json!({"id": 42})).unwrap();
//! });
//!
//! let data = req.timing().unwrap().get_data();
//! assert!(data.is_closed());
//! assert!(data.event("db").unwrap().elapsed_ms.is_some());
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::handle::TimingHandle;
use crate::request::Instrumentable;
use crate::response::{ResponseSurface, TimedResponse};
use std::fmt;
use std::sync::Arc;

/// Factory for per-request timing sessions
#[derive(Clone)]
pub struct RequestTracker {
    config: TrackerConfig,
    diagnostics: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
}

impl RequestTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            diagnostics: Arc::new(TracingDiagnostics),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the diagnostics sink
    pub fn with_diagnostics<D>(mut self, diagnostics: D) -> Self
    where
        D: Diagnostics + 'static,
    {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    /// Replace the clock
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Open a session without any request/response plumbing
    pub fn start_session(&self, method: &str, url: &str) -> TimingHandle {
        TimingHandle::open(
            method,
            url,
            self.config.clone(),
            Arc::clone(&self.diagnostics),
            Arc::clone(&self.clock),
        )
    }

    /// Middleware step: time `request` and finalize when `response` is sent
    ///
    /// Attaches a fresh session to `request`, wraps `response` so that any
    /// response-emitting operation finalizes the session, and calls
    /// `proceed` with both. Returns whatever `proceed` returns.
    pub fn intercept<Req, Res, F, T>(&self, request: &mut Req, response: Res, proceed: F) -> T
    where
        Req: Instrumentable,
        Res: ResponseSurface,
        F: FnOnce(&mut Req, TimedResponse<Res>) -> T,
    {
        let handle = self.start_session(&request.method(), &request.url());
        request.attach_timing(handle.clone());
        proceed(request, TimedResponse::new(response, handle))
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
