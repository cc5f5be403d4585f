use std::{any::Any, fmt, iter, sync::Arc};

/// A key identifying a binding in a [`Context`].
///
/// Implemented for every `'static` value that is `PartialEq + Debug + Send + Sync`,
/// so unit structs, enums and string literals can all be used as keys.
/// Two keys match only when they have the same type and compare equal.
pub trait ContextKey: Any + fmt::Debug + Send + Sync {
    /// Returns `true` if `other` has the same type as `self` and compares equal.
    fn key_eq(&self, other: &dyn ContextKey) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl<T> ContextKey for T
where
    T: Any + PartialEq + fmt::Debug + Send + Sync,
{
    fn key_eq(&self, other: &dyn ContextKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Binding {
    key: Arc<dyn ContextKey>,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Binding>>,
}

/// An immutable, append-only key/value environment.
///
/// A `Context` is a chain of bindings shared through `Arc`, so cloning is
/// cheap and adding a binding never changes an existing context value.
/// The newest binding for a key shadows older ones.
///
/// # Example
/// ```
/// use rigging::Context;
///
/// let base = Context::background().with_value("region", "eu-west-1");
/// let child = base.clone().with_value("region", "us-east-1");
///
/// assert_eq!(base.get::<&str>(&"region"), Some(&"eu-west-1"));
/// assert_eq!(child.get::<&str>(&"region"), Some(&"us-east-1"));
/// ```
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Binding>>,
    len: usize,
}

impl Context {
    /// The empty context, used when no base context is supplied.
    pub const fn background() -> Context {
        Context { head: None, len: 0 }
    }

    /// Returns a new context holding every binding of `self` plus `key → value`.
    ///
    /// # Example
    /// ```
    /// use rigging::Context;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct RequestId;
    ///
    /// let ctx = Context::background().with_value(RequestId, 7u64);
    /// assert_eq!(ctx.get::<u64>(&RequestId), Some(&7));
    /// ```
    pub fn with_value<K, V>(self, key: K, value: V) -> Context
    where
        K: ContextKey,
        V: Any + Send + Sync,
    {
        self.bind(Arc::new(key), Arc::new(value))
    }

    pub(crate) fn bind(
        self,
        key: Arc<dyn ContextKey>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Context {
        Context {
            len: self.len + 1,
            head: Some(Arc::new(Binding {
                key,
                value,
                parent: self.head,
            })),
        }
    }

    /// Retrieves the value bound to `key`, if it has type `V`.
    ///
    /// Only the newest binding for `key` is considered: if it holds a value
    /// of another type, `None` is returned even when an older binding for
    /// the same key has type `V`.
    ///
    /// # Example
    /// ```
    /// use rigging::Context;
    ///
    /// let ctx = Context::background().with_value("port", 8080u16);
    /// assert_eq!(ctx.get::<u16>(&"port"), Some(&8080));
    /// assert_eq!(ctx.get::<u32>(&"port"), None);
    /// assert_eq!(ctx.get::<u16>(&"host"), None);
    /// ```
    pub fn get<V: Any>(&self, key: &dyn ContextKey) -> Option<&V> {
        self.lookup(key)?.downcast_ref::<V>()
    }

    /// Retrieves the value bound to `key` without a type check.
    pub fn lookup(&self, key: &dyn ContextKey) -> Option<&(dyn Any + Send + Sync)> {
        self.bindings()
            .find(|binding| binding.key.key_eq(key))
            .map(|binding| &*binding.value)
    }

    pub fn contains(&self, key: &dyn ContextKey) -> bool {
        self.lookup(key).is_some()
    }

    /// Returns the number of bindings, shadowed ones included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the keys of every binding, newest first.
    pub fn keys(&self) -> impl Iterator<Item = &dyn ContextKey> {
        self.bindings().map(|binding| &*binding.key)
    }

    fn bindings(&self) -> impl Iterator<Item = &Binding> {
        iter::successors(self.head.as_deref(), |binding| binding.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
