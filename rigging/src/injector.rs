use std::{any::Any, fmt, sync::Arc};

use crate::{Context, ContextKey};

/// Enriches a [`Context`] with additional bindings.
///
/// Injectors must not fail. Implemented for every `Fn(Context) -> Context`.
pub trait Inject: Send + Sync {
    fn inject(&self, ctx: Context) -> Context;
}

impl<F> Inject for F
where
    F: Fn(Context) -> Context + Send + Sync,
{
    fn inject(&self, ctx: Context) -> Context {
        (self)(ctx)
    }
}

/// A shared, type-erased [`Inject`].
///
/// Composite injectors built by [`Injector::chain`] are `Injector`s too.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<dyn Inject>,
}

impl Injector {
    pub fn new<T>(inject: T) -> Injector
    where
        T: Inject + 'static,
    {
        Injector {
            inner: Arc::new(inject),
        }
    }

    /// Returns the context unchanged.
    pub fn identity() -> Injector {
        Injector::new(Identity)
    }

    /// Binds `key → value` on every invocation.
    ///
    /// The value is shared between invocations rather than cloned.
    ///
    /// # Example
    /// ```
    /// use rigging::{Context, Inject, Injector};
    ///
    /// let injector = Injector::singleton("greeting", String::from("hello"));
    /// let ctx = injector.inject(Context::background());
    /// assert_eq!(ctx.get::<String>(&"greeting").map(String::as_str), Some("hello"));
    /// ```
    pub fn singleton<K, V>(key: K, value: V) -> Injector
    where
        K: ContextKey,
        V: Any + Send + Sync,
    {
        Injector::new(Singleton {
            key: Arc::new(key),
            value: Arc::new(value),
        })
    }

    /// Composes `injectors` into one that applies them left to right,
    /// each consuming the context produced by its predecessor.
    ///
    /// An empty sequence yields the identity.
    pub fn chain<I>(injectors: I) -> Injector
    where
        I: IntoIterator<Item = Injector>,
    {
        let injectors = injectors.into_iter().collect::<Vec<_>>();
        if injectors.is_empty() {
            return Injector::identity();
        }
        Injector::new(Chain { injectors })
    }
}

impl Inject for Injector {
    fn inject(&self, ctx: Context) -> Context {
        self.inner.inject(ctx)
    }
}

impl FromIterator<Injector> for Injector {
    fn from_iter<T: IntoIterator<Item = Injector>>(iter: T) -> Self {
        Injector::chain(iter)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector").finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Identity;

impl Inject for Identity {
    fn inject(&self, ctx: Context) -> Context {
        ctx
    }
}

struct Singleton {
    key: Arc<dyn ContextKey>,
    value: Arc<dyn Any + Send + Sync>,
}

impl Inject for Singleton {
    fn inject(&self, ctx: Context) -> Context {
        ctx.bind(self.key.clone(), self.value.clone())
    }
}

struct Chain {
    injectors: Vec<Injector>,
}

impl Inject for Chain {
    fn inject(&self, ctx: Context) -> Context {
        self.injectors
            .iter()
            .fold(ctx, |ctx, injector| injector.inject(ctx))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Then<T1, T2> {
    pub left: T1,
    pub right: T2,
}

impl<T1, T2> Then<T1, T2> {
    pub fn new(left: T1, right: T2) -> Then<T1, T2> {
        Then { left, right }
    }
}

impl<T1, T2> Inject for Then<T1, T2>
where
    T1: Inject,
    T2: Inject,
{
    fn inject(&self, ctx: Context) -> Context {
        self.right.inject(self.left.inject(ctx))
    }
}

pub trait InjectExt: Inject {
    /// Applies `next` to the context produced by `self`.
    fn then<T>(self, next: T) -> Then<Self, T>
    where
        Self: Sized,
        T: Inject,
    {
        Then::new(self, next)
    }

    fn boxed(self) -> Injector
    where
        Self: Sized + 'static,
    {
        Injector::new(self)
    }
}

impl<T> InjectExt for T where T: Inject {}
