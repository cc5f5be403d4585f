//! Request context injection for `http` services.
//!
//! [`ContextLayer`] wraps a [`tower::Service`] so every request carries a
//! [`Context`] enriched by an [`Injector`] before it reaches the inner
//! service. Handlers read it back with [`RequestContextExt::context`].

mod ext;
mod layer;

pub use self::{
    ext::RequestContextExt,
    layer::{ContextLayer, InjectContext, layer},
};

pub use rigging::{Context, Injector};
