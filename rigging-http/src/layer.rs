use core::task::{Context as TaskContext, Poll};

use http::Request;
use rigging::{Context, Inject, Injector};
use tower::{Layer, Service};
use tracing::trace;

pub fn layer(injector: Injector) -> ContextLayer {
    ContextLayer::new(injector)
}

/// Wraps services in [`InjectContext`].
#[derive(Debug, Clone)]
pub struct ContextLayer {
    injector: Injector,
}

impl ContextLayer {
    pub fn new(injector: Injector) -> ContextLayer {
        ContextLayer { injector }
    }
}

impl<S> Layer<S> for ContextLayer {
    type Service = InjectContext<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InjectContext {
            inner,
            injector: self.injector.clone(),
        }
    }
}

/// Replaces each request's [`Context`] with the injector applied to it,
/// then calls the inner service.
///
/// A request without a context starts from [`Context::background`].
/// Responses and errors pass through untouched.
#[derive(Debug, Clone)]
pub struct InjectContext<S> {
    inner: S,
    injector: Injector,
}

impl<S> InjectContext<S> {
    pub fn new(inner: S, injector: Injector) -> InjectContext<S> {
        InjectContext { inner, injector }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, B> Service<Request<B>> for InjectContext<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let ctx = req.extensions_mut().remove::<Context>().unwrap_or_default();
        trace!(bindings = ctx.len(), "injecting request context");
        req.extensions_mut().insert(self.injector.inject(ctx));
        self.inner.call(req)
    }
}
