//! Composable resource initialization.
//!
//! An [`Initializer`] acquires a resource and returns an [`Injector`], which
//! exposes the resource through a [`Context`], and a [`Releaser`], which
//! tears it down. [`initialize`] runs a sequence of initializers, threading
//! the context through them, and combines the results: the injectors run in
//! acquisition order, the releasers in reverse. If an initializer fails,
//! everything acquired before it is released and the error is returned
//! unchanged.

mod context;
mod initializer;
mod injector;
mod releaser;
#[cfg(test)]
mod testing;

pub use self::{
    context::{Context, ContextKey},
    initializer::{
        BoxInitializer, DynInitializer, Initializer, Initializers, box_initializer, initialize,
        initialize_with,
    },
    injector::{Inject, InjectExt, Injector, Then},
    releaser::{Close, Release, ReleaseGuard, Releaser},
};

pub use rigging_error::{BoxError, Error, Result};

pub mod prelude {
    pub use super::{Close, Inject, InjectExt, Initializer, Release};
}
