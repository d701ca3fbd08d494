//! Response surface and the finalizing decorator
//!
//! Hosts expose their response object through [`ResponseSurface`]. The
//! tracker hands application code a [`TimedResponse`] instead, which runs
//! each original operation and then finalizes the session. Whichever
//! operation fires first closes the session; later ones are no-ops for
//! timing.

use crate::handle::TimingHandle;
use crate::wrap;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// The response-emitting operations that finalize a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseOp {
    Send,
    SendFile,
    Render,
    SendStatus,
    Json,
    Jsonp,
    End,
}

impl ResponseOp {
    pub const ALL: [ResponseOp; 7] = [
        ResponseOp::Send,
        ResponseOp::SendFile,
        ResponseOp::Render,
        ResponseOp::SendStatus,
        ResponseOp::Json,
        ResponseOp::Jsonp,
        ResponseOp::End,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResponseOp::Send => "send",
            ResponseOp::SendFile => "send_file",
            ResponseOp::Render => "render",
            ResponseOp::SendStatus => "send_status",
            ResponseOp::Json => "json",
            ResponseOp::Jsonp => "jsonp",
            ResponseOp::End => "end",
        }
    }
}

impl fmt::Display for ResponseOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host framework's response object
///
/// Hosts lacking an operation return `false` from [`supports`](Self::supports)
/// for it; [`TimedResponse`] then forwards that operation without finalizing.
pub trait ResponseSurface {
    type Error;

    /// Send a response body
    fn send(&mut self, body: &[u8]) -> Result<(), Self::Error>;

    /// Stream a file as the response body
    fn send_file(&mut self, path: &Path) -> Result<(), Self::Error>;

    /// Render a named template with `locals`
    fn render(&mut self, view: &str, locals: &Value) -> Result<(), Self::Error>;

    /// Send a bare status code
    fn send_status(&mut self, status: u16) -> Result<(), Self::Error>;

    fn json(&mut self, body: &Value) -> Result<(), Self::Error>;

    fn jsonp(&mut self, body: &Value) -> Result<(), Self::Error>;

    /// End the response stream, optionally with a final chunk
    fn end(&mut self, chunk: Option<&[u8]>) -> Result<(), Self::Error>;

    fn supports(&self, _op: ResponseOp) -> bool {
        true
    }
}

/// Response decorator that finalizes the session after each operation
///
/// The original operation runs exactly once with its arguments untouched,
/// and its result is returned as is. Finalization only follows an `Ok`.
pub struct TimedResponse<R> {
    inner: R,
    handle: TimingHandle,
}

impl<R: ResponseSurface> TimedResponse<R> {
    pub fn new(inner: R, handle: TimingHandle) -> Self {
        Self { inner, handle }
    }

    pub fn handle(&self) -> &TimingHandle {
        &self.handle
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn emit<A, F>(&mut self, op: ResponseOp, args: A, mut original: F) -> Result<(), R::Error>
    where
        F: FnMut(&mut R, A) -> Result<(), R::Error>,
    {
        if !self.inner.supports(op) {
            return original(&mut self.inner, args);
        }

        let inner = &mut self.inner;
        let handle = &self.handle;
        let mut finalizing = wrap::after(
            move |args: A| original(&mut *inner, args),
            |out: &Result<(), R::Error>| {
                if out.is_ok() && handle.end_request() {
                    tracing::debug!(session_id = %handle.id(), op = op.name(), "finalized by response");
                }
            },
        );
        finalizing(args)
    }
}

impl<R: ResponseSurface> ResponseSurface for TimedResponse<R> {
    type Error = R::Error;

    fn send(&mut self, body: &[u8]) -> Result<(), Self::Error> {
        self.emit(ResponseOp::Send, body, |r, body| r.send(body))
    }

    fn send_file(&mut self, path: &Path) -> Result<(), Self::Error> {
        self.emit(ResponseOp::SendFile, path, |r, path| r.send_file(path))
    }

    fn render(&mut self, view: &str, locals: &Value) -> Result<(), Self::Error> {
        self.emit(ResponseOp::Render, (view, locals), |r, (view, locals)| {
            r.render(view, locals)
        })
    }

    fn send_status(&mut self, status: u16) -> Result<(), Self::Error> {
        self.emit(ResponseOp::SendStatus, status, |r, status| r.send_status(status))
    }

    fn json(&mut self, body: &Value) -> Result<(), Self::Error> {
        self.emit(ResponseOp::Json, body, |r, body| r.json(body))
    }

    fn jsonp(&mut self, body: &Value) -> Result<(), Self::Error> {
        self.emit(ResponseOp::Jsonp, body, |r, body| r.jsonp(body))
    }

    fn end(&mut self, chunk: Option<&[u8]>) -> Result<(), Self::Error> {
        self.emit(ResponseOp::End, chunk, |r, chunk| r.end(chunk))
    }

    fn supports(&self, op: ResponseOp) -> bool {
        self.inner.supports(op)
    }
}

impl<R: fmt::Debug> fmt::Debug for TimedResponse<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedResponse")
            .field("inner", &self.inner)
            .field("session_id", &self.handle.id())
            .finish()
    }
}
