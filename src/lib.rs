//! reqtime - per-request timing instrumentation for middleware chains
//!
//! A [`RequestTracker`] attaches a timing session to each request it
//! intercepts. Application code marks named events with `record`/`stop`,
//! and the session is finalized exactly once when the response is sent,
//! whichever response operation sends it.

pub mod cli;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handle;
pub mod request;
pub mod response;
pub mod scenario;
pub mod session;
pub mod tracker;
pub mod wrap;

pub use config::{ClosedPolicy, TrackerConfig};
pub use handle::TimingHandle;
pub use session::{EventRecord, SessionData};
pub use tracker::RequestTracker;
