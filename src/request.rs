//! Request side of the host integration
//!
//! [`Instrumentable`] is what `intercept` needs from a host request: its
//! verb and route, and a slot to carry the [`TimingHandle`]. With the `http`
//! feature, `http::Request<B>` stores the handle in its extensions.

use crate::handle::TimingHandle;
use std::borrow::Cow;

/// A host request that can carry a timing session
pub trait Instrumentable {
    fn method(&self) -> Cow<'_, str>;

    /// Route including any query string
    fn url(&self) -> Cow<'_, str>;

    fn attach_timing(&mut self, handle: TimingHandle);

    fn timing(&self) -> Option<&TimingHandle>;
}

#[cfg(feature = "http")]
impl<B> Instrumentable for http::Request<B> {
    fn method(&self) -> Cow<'_, str> {
        Cow::Borrowed(http::Request::method(self).as_str())
    }

    fn url(&self) -> Cow<'_, str> {
        match self.uri().path_and_query() {
            Some(pq) => Cow::Borrowed(pq.as_str()),
            None => Cow::Owned(self.uri().to_string()),
        }
    }

    fn attach_timing(&mut self, handle: TimingHandle) {
        self.extensions_mut().insert(handle);
    }

    fn timing(&self) -> Option<&TimingHandle> {
        self.extensions().get::<TimingHandle>()
    }
}
