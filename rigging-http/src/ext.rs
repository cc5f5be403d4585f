use http::{Request, request::Parts};
use rigging::Context;

/// Access to the [`Context`] attached to a request.
pub trait RequestContextExt {
    /// Returns the request context, or the background context if none is
    /// attached.
    fn context(&self) -> Context;
}

impl<B> RequestContextExt for Request<B> {
    fn context(&self) -> Context {
        self.extensions().get::<Context>().cloned().unwrap_or_default()
    }
}

impl RequestContextExt for Parts {
    fn context(&self) -> Context {
        self.extensions.get::<Context>().cloned().unwrap_or_default()
    }
}
