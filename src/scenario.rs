//! Scripted request replay
//!
//! A scenario describes one request: its identity, the timing calls the
//! application makes, and the response it finally emits. It runs through
//! [`RequestTracker::intercept`] with an in-memory request and a recording
//! response, which makes it usable both from the `reqtime` binary and from
//! tests.
//!
//! ```toml
//! [request]
//! method = "GET"
//! url = "/items/42"
//!
//! [[steps]]
//! action = "record"
//! name = "db"
//!
//! [[steps]]
//! action = "sleep"
//! ms = 5
//!
//! [[steps]]
//! action = "stop"
//! name = "db"
//!
//! [response]
//! op = "json"
//! body = { id = 42 }
//! ```

use crate::error::ScenarioError;
use crate::handle::TimingHandle;
use crate::request::Instrumentable;
use crate::response::{ResponseOp, ResponseSurface};
use crate::session::SessionData;
use crate::tracker::RequestTracker;
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimal in-memory request
#[derive(Debug, Clone)]
pub struct ScenarioRequest {
    method: String,
    url: String,
    timing: Option<TimingHandle>,
}

impl ScenarioRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            timing: None,
        }
    }
}

impl Instrumentable for ScenarioRequest {
    fn method(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.method)
    }

    fn url(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.url)
    }

    fn attach_timing(&mut self, handle: TimingHandle) {
        self.timing = Some(handle);
    }

    fn timing(&self) -> Option<&TimingHandle> {
        self.timing.as_ref()
    }
}

/// Response that records what was emitted instead of writing to a socket
#[derive(Debug, Clone)]
pub struct RecordingResponse {
    emitted: Vec<ResponseOp>,
    status: u16,
    body: Vec<u8>,
    content_type: Option<&'static str>,
    unsupported: Vec<ResponseOp>,
    failing: Vec<ResponseOp>,
}

impl Default for RecordingResponse {
    fn default() -> Self {
        Self {
            emitted: Vec::new(),
            status: 200,
            body: Vec::new(),
            content_type: None,
            unsupported: Vec::new(),
            failing: Vec::new(),
        }
    }
}

impl RecordingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `op` as unsupported
    pub fn without(mut self, op: ResponseOp) -> Self {
        self.unsupported.push(op);
        self
    }

    /// Make `op` fail
    pub fn failing(mut self, op: ResponseOp) -> Self {
        self.failing.push(op);
        self
    }

    pub fn emitted(&self) -> Vec<ResponseOp> {
        self.emitted.clone()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    fn begin(&mut self, op: ResponseOp) -> Result<(), ScenarioError> {
        if self.unsupported.contains(&op) {
            return Err(ScenarioError::Unsupported(op.name()));
        }
        if self.failing.contains(&op) {
            return Err(ScenarioError::Failed(op.name()));
        }
        self.emitted.push(op);
        Ok(())
    }
}

impl ResponseSurface for RecordingResponse {
    type Error = ScenarioError;

    fn send(&mut self, body: &[u8]) -> Result<(), Self::Error> {
        self.begin(ResponseOp::Send)?;
        self.body = body.to_vec();
        Ok(())
    }

    fn send_file(&mut self, path: &Path) -> Result<(), Self::Error> {
        self.begin(ResponseOp::SendFile)?;
        self.content_type = Some("application/octet-stream");
        self.body = path.display().to_string().into_bytes();
        Ok(())
    }

    fn render(&mut self, view: &str, locals: &Value) -> Result<(), Self::Error> {
        self.begin(ResponseOp::Render)?;
        self.content_type = Some("text/html");
        self.body = format!("<{view}>{locals}</{view}>").into_bytes();
        Ok(())
    }

    fn send_status(&mut self, status: u16) -> Result<(), Self::Error> {
        self.begin(ResponseOp::SendStatus)?;
        self.status = status;
        Ok(())
    }

    fn json(&mut self, body: &Value) -> Result<(), Self::Error> {
        self.begin(ResponseOp::Json)?;
        self.content_type = Some("application/json");
        self.body = body.to_string().into_bytes();
        Ok(())
    }

    fn jsonp(&mut self, body: &Value) -> Result<(), Self::Error> {
        self.begin(ResponseOp::Jsonp)?;
        self.content_type = Some("text/javascript");
        self.body = format!("callback({body});").into_bytes();
        Ok(())
    }

    fn end(&mut self, chunk: Option<&[u8]>) -> Result<(), Self::Error> {
        self.begin(ResponseOp::End)?;
        if let Some(chunk) = chunk {
            self.body.extend_from_slice(chunk);
        }
        Ok(())
    }

    fn supports(&self, op: ResponseOp) -> bool {
        !self.unsupported.contains(&op)
    }
}

/// Identity of the scripted request
#[derive(Debug, Clone, Deserialize)]
pub struct RequestLine {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
}

fn default_method() -> String {
    "GET".to_string()
}

/// One application-side timing call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Record { name: String },
    Stop { name: String },
    Log { name: String },
    Sleep { ms: u64 },
    EndRequest,
}

/// The response emitted after the steps
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ResponseAction {
    Send {
        body: String,
    },
    SendFile {
        path: PathBuf,
    },
    Render {
        view: String,
        #[serde(default)]
        locals: Value,
    },
    SendStatus {
        status: u16,
    },
    Json {
        body: Value,
    },
    Jsonp {
        body: Value,
    },
    End {
        #[serde(default)]
        chunk: Option<String>,
    },
}

/// A complete scripted request
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub request: RequestLine,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub response: Option<ResponseAction>,
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let input = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }
}

/// Result of replaying a scenario
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub data: SessionData,
    pub response: RecordingResponse,
}

/// Replay `scenario` through `tracker`
///
/// `pause` implements sleep steps, so tests can advance a manual clock
/// instead of blocking.
pub fn run_scenario<P>(
    tracker: &RequestTracker,
    scenario: &Scenario,
    mut pause: P,
) -> Result<ScenarioOutcome, ScenarioError>
where
    P: FnMut(Duration),
{
    let mut request = ScenarioRequest::new(&scenario.request.method, &scenario.request.url);

    let (handle, response) = tracker.intercept(
        &mut request,
        RecordingResponse::new(),
        |req, mut res| -> Result<_, ScenarioError> {
            let handle = res.handle().clone();
            if let Some(timing) = req.timing() {
                for step in &scenario.steps {
                    match step {
                        Step::Record { name } => timing.record(name),
                        Step::Stop { name } => timing.stop(name),
                        Step::Log { name } => timing.log_event(name),
                        Step::Sleep { ms } => pause(Duration::from_millis(*ms)),
                        Step::EndRequest => {
                            timing.end_request();
                        }
                    }
                }
            }

            if let Some(action) = &scenario.response {
                respond(&mut res, action)?;
            }
            Ok((handle, res.into_inner()))
        },
    )?;

    Ok(ScenarioOutcome {
        data: handle.get_data(),
        response,
    })
}

fn respond<R>(res: &mut R, action: &ResponseAction) -> Result<(), R::Error>
where
    R: ResponseSurface,
{
    match action {
        ResponseAction::Send { body } => res.send(body.as_bytes()),
        ResponseAction::SendFile { path } => res.send_file(path),
        ResponseAction::Render { view, locals } => res.render(view, locals),
        ResponseAction::SendStatus { status } => res.send_status(*status),
        ResponseAction::Json { body } => res.json(body),
        ResponseAction::Jsonp { body } => res.jsonp(body),
        ResponseAction::End { chunk } => res.end(chunk.as_deref().map(str::as_bytes)),
    }
}
