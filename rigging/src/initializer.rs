use std::fmt;

use tracing::{debug, trace};

use crate::{Context, Inject, Injector, Releaser, releaser::release_reverse};

/// Acquires a resource given the context built so far, returning how to
/// expose it downstream and how to release it.
///
/// Implemented for every `FnOnce(&Context) -> Result<(Injector, Releaser), E>`.
pub trait Initializer {
    type Error;

    fn initialize(self, ctx: &Context) -> Result<(Injector, Releaser), Self::Error>;
}

impl<F, E> Initializer for F
where
    F: FnOnce(&Context) -> Result<(Injector, Releaser), E>,
{
    type Error = E;

    fn initialize(self, ctx: &Context) -> Result<(Injector, Releaser), Self::Error> {
        (self)(ctx)
    }
}

pub trait DynInitializer<E> {
    fn initialize_boxed(self: Box<Self>, ctx: &Context) -> Result<(Injector, Releaser), E>;
}

impl<T> DynInitializer<T::Error> for T
where
    T: Initializer,
{
    fn initialize_boxed(self: Box<Self>, ctx: &Context) -> Result<(Injector, Releaser), T::Error> {
        (*self).initialize(ctx)
    }
}

/// A type-erased [`Initializer`], so initializers of different types can
/// share one sequence.
pub struct BoxInitializer<'a, E> {
    inner: Box<dyn DynInitializer<E> + 'a>,
}

impl<'a, E> BoxInitializer<'a, E> {
    pub fn new<T>(initializer: T) -> BoxInitializer<'a, E>
    where
        T: Initializer<Error = E> + 'a,
    {
        BoxInitializer {
            inner: Box::new(initializer),
        }
    }
}

impl<E> Initializer for BoxInitializer<'_, E> {
    type Error = E;

    fn initialize(self, ctx: &Context) -> Result<(Injector, Releaser), E> {
        self.inner.initialize_boxed(ctx)
    }
}

impl<E> fmt::Debug for BoxInitializer<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxInitializer").finish_non_exhaustive()
    }
}

pub fn box_initializer<'a, T>(initializer: T) -> BoxInitializer<'a, T::Error>
where
    T: Initializer + 'a,
{
    BoxInitializer::new(initializer)
}

/// An ordered list of initializers.
pub struct Initializers<'a, E> {
    initializers: Vec<BoxInitializer<'a, E>>,
}

impl<E> Default for Initializers<'_, E> {
    fn default() -> Self {
        Initializers {
            initializers: Default::default(),
        }
    }
}

impl<'a, E> Initializers<'a, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T>(&mut self, initializer: T) -> &mut Self
    where
        T: Initializer<Error = E> + 'a,
    {
        self.initializers.push(BoxInitializer::new(initializer));
        self
    }

    pub fn with<T>(mut self, initializer: T) -> Self
    where
        T: Initializer<Error = E> + 'a,
    {
        self.push(initializer);
        self
    }

    pub fn len(&self) -> usize {
        self.initializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
    }

    pub fn initialize(self) -> Result<(Injector, Releaser), E> {
        initialize(self)
    }

    pub fn initialize_with(self, ctx: Context) -> Result<(Injector, Releaser), E> {
        initialize_with(ctx, self)
    }
}

impl<'a, E> IntoIterator for Initializers<'a, E> {
    type Item = BoxInitializer<'a, E>;
    type IntoIter = std::vec::IntoIter<BoxInitializer<'a, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.initializers.into_iter()
    }
}

impl<E> fmt::Debug for Initializers<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Initializers")
            .field("len", &self.initializers.len())
            .finish()
    }
}

/// Runs `initializers` in order, starting from the background context.
///
/// See [`initialize_with`].
pub fn initialize<I>(
    initializers: I,
) -> Result<(Injector, Releaser), <I::Item as Initializer>::Error>
where
    I: IntoIterator,
    I::Item: Initializer,
{
    initialize_with(Context::background(), initializers)
}

/// Runs `initializers` in order and combines their results.
///
/// Each initializer receives `ctx` with the injectors of all preceding
/// initializers applied. On success the returned injector applies every
/// injector in order and the returned releaser releases every resource in
/// reverse order.
///
/// If an initializer fails, the resources acquired so far are released in
/// reverse order and its error is returned unchanged.
///
/// # Example
/// ```
/// use rigging::{Context, Error, Inject, Initializers, Injector, Releaser};
///
/// let (injector, releaser) = Initializers::new()
///     .with(|_: &Context| -> Result<(Injector, Releaser), Error> {
///         Ok((Injector::singleton("db", 1u8), Releaser::noop()))
///     })
///     .with(|ctx: &Context| -> Result<(Injector, Releaser), Error> {
///         let db = *ctx.get::<u8>(&"db").ok_or("db missing")?;
///         Ok((Injector::singleton("cache", db + 1), Releaser::noop()))
///     })
///     .initialize()?;
///
/// let ctx = injector.inject(Context::background());
/// assert_eq!(ctx.get::<u8>(&"cache"), Some(&2));
/// releaser.release();
/// # Ok::<_, Error>(())
/// ```
pub fn initialize_with<I>(
    ctx: Context,
    initializers: I,
) -> Result<(Injector, Releaser), <I::Item as Initializer>::Error>
where
    I: IntoIterator,
    I::Item: Initializer,
{
    let initializers = initializers.into_iter();
    let hint = initializers.size_hint();
    let (lower, _) = hint;
    debug!(initializers = ?exact_len(hint), "initializing");

    let mut injectors = Vec::with_capacity(lower);
    let mut acquired = Acquired::with_capacity(lower);
    let mut ctx = ctx;

    for (index, initializer) in initializers.enumerate() {
        match initializer.initialize(&ctx) {
            Ok((injector, releaser)) => {
                trace!(index, "initializer succeeded");
                acquired.push(releaser);
                ctx = injector.inject(ctx);
                injectors.push(injector);
            }
            Err(err) => {
                debug!(
                    index,
                    acquired = acquired.len(),
                    "initializer failed, releasing acquired resources"
                );
                acquired.unwind();
                return Err(err);
            }
        }
    }

    debug!(initialized = injectors.len(), "initialization complete");

    Ok((Injector::chain(injectors), acquired.finish()))
}

/// The length of an iterator, if its size hint pins it down.
fn exact_len((lower, upper): (usize, Option<usize>)) -> Option<usize> {
    (upper == Some(lower)).then_some(lower)
}

/// Releasers gathered during initialization.
///
/// Dropped without [`Acquired::finish`], e.g. while a panic unwinds, it
/// releases everything it holds in reverse order.
struct Acquired {
    releasers: Option<Vec<Releaser>>,
}

impl Acquired {
    fn with_capacity(capacity: usize) -> Acquired {
        Acquired {
            releasers: Some(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, releaser: Releaser) {
        if let Some(releasers) = &mut self.releasers {
            releasers.push(releaser);
        }
    }

    fn len(&self) -> usize {
        self.releasers.as_ref().map_or(0, Vec::len)
    }

    fn unwind(mut self) {
        if let Some(releasers) = self.releasers.take() {
            release_reverse(releasers);
        }
    }

    fn finish(mut self) -> Releaser {
        self.releasers
            .take()
            .map(Releaser::all)
            .unwrap_or_default()
    }
}

impl Drop for Acquired {
    fn drop(&mut self) {
        if let Some(releasers) = self.releasers.take() {
            debug!(
                acquired = releasers.len(),
                "initialization aborted, releasing acquired resources"
            );
            release_reverse(releasers);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::testing::{Journal, Key};
    use rigging_error::Error;

    #[derive(Debug, PartialEq)]
    struct Failure(&'static str);

    fn succeed(
        journal: &Journal,
        name: &'static str,
        key: Key,
        value: &'static str,
    ) -> impl FnOnce(&Context) -> Result<(Injector, Releaser), Failure> + use<> {
        let journal = journal.clone();
        move |ctx: &Context| {
            journal.record(format!("initialize {name} {}", ctx.len()));
            Ok((journal.injector(name, key, value), journal.releaser(name)))
        }
    }

    fn fail(
        journal: &Journal,
        name: &'static str,
    ) -> impl FnOnce(&Context) -> Result<(Injector, Releaser), Failure> + use<> {
        let journal = journal.clone();
        move |_: &Context| {
            journal.record(format!("initialize {name}"));
            Err(Failure("initializer error"))
        }
    }

    fn releases(journal: &Journal) -> Vec<String> {
        journal
            .entries()
            .into_iter()
            .filter(|entry| entry.starts_with("release"))
            .collect()
    }

    #[test]
    fn test_initialize_ok() {
        let journal = Journal::default();
        let (injector, releaser) = initialize([
            succeed(&journal, "a", Key::First, "v1"),
            succeed(&journal, "b", Key::Second, "v2"),
        ])
        .expect("initialize");

        let ctx = injector.inject(Context::background());
        assert_eq!(ctx.get::<&str>(&Key::First), Some(&"v1"));
        assert_eq!(ctx.get::<&str>(&Key::Second), Some(&"v2"));

        releaser.release();

        assert_eq!(
            journal.entries(),
            vec![
                "initialize a 0",
                "inject a []",
                "initialize b 1",
                "inject b [\"First\"]",
                // composite injector applied by the caller
                "inject a []",
                "inject b [\"First\"]",
                "release b",
                "release a",
            ]
        );
    }

    #[test]
    fn test_initialize_fail_releases_acquired() {
        let journal = Journal::default();
        let mut initializers = Initializers::new();
        initializers
            .push(succeed(&journal, "a", Key::First, "v1"))
            .push(fail(&journal, "b"))
            .push(succeed(&journal, "c", Key::Third, "v3"));

        let err = initializers.initialize().expect_err("must fail");

        assert_eq!(err, Failure("initializer error"));
        assert_eq!(
            journal.entries(),
            vec!["initialize a 0", "inject a []", "initialize b", "release a"]
        );
    }

    #[test]
    fn test_initialize_fail_at_index_releases_prefix_in_reverse() {
        for k in 0..4 {
            let journal = Journal::default();
            let mut initializers = Initializers::new();
            let keys = [Key::First, Key::Second, Key::Third];
            let names = ["a", "b", "c", "d"];
            for (idx, &name) in names.iter().enumerate() {
                if idx == k {
                    initializers.push(fail(&journal, name));
                } else {
                    initializers.push(succeed(&journal, name, keys[idx % 3], "v"));
                }
            }

            assert!(initializers.initialize().is_err());

            let expected = names[..k]
                .iter()
                .rev()
                .map(|name| format!("release {name}"))
                .collect::<Vec<_>>();
            assert_eq!(releases(&journal), expected, "failure at index {k}");
        }
    }

    #[test]
    fn test_initialize_empty() {
        let (injector, releaser) =
            initialize(Initializers::<Failure>::new()).expect("initialize");

        let ctx = Context::background().with_value(Key::First, "v1");
        let out = injector.inject(ctx);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get::<&str>(&Key::First), Some(&"v1"));

        releaser.release();
    }

    #[test]
    fn test_initialize_with_base_context() {
        let journal = Journal::default();
        let base = Context::background().with_value("env", "test");
        let (injector, _) = Initializers::new()
            .with(|ctx: &Context| -> Result<(Injector, Releaser), Failure> {
                let env = *ctx.get::<&str>(&"env").ok_or(Failure("env missing"))?;
                Ok((Injector::singleton(Key::First, env), Releaser::noop()))
            })
            .with(succeed(&journal, "b", Key::Second, "v2"))
            .initialize_with(base)
            .expect("initialize");

        assert_eq!(journal.entries(), vec!["initialize b 2", "inject b [\"First\"]"]);

        let ctx = injector.inject(Context::background());
        assert_eq!(ctx.get::<&str>(&Key::First), Some(&"test"));
        assert!(!ctx.contains(&"env"));
    }

    #[test]
    fn test_initialize_panic_releases_acquired() {
        let journal = Journal::default();
        let mut initializers = Initializers::<Failure>::new();
        initializers
            .push(succeed(&journal, "a", Key::First, "v1"))
            .push(succeed(&journal, "b", Key::Second, "v2"))
            .push(|_: &Context| -> Result<(Injector, Releaser), Failure> {
                panic!("initializer panicked")
            });

        let result = panic::catch_unwind(AssertUnwindSafe(move || initializers.initialize()));

        assert!(result.is_err());
        assert_eq!(releases(&journal), vec!["release b", "release a"]);
    }

    #[test]
    fn test_initialize_injector_panic_releases_acquired() {
        let journal = Journal::default();
        let mut initializers = Initializers::<Failure>::new();
        let releaser = journal.releaser("c");
        initializers
            .push(succeed(&journal, "a", Key::First, "v1"))
            .push(succeed(&journal, "b", Key::Second, "v2"))
            .push(move |_: &Context| -> Result<(Injector, Releaser), Failure> {
                let injector = Injector::new(|_: Context| -> Context { panic!("injector panicked") });
                Ok((injector, releaser))
            });

        let result = panic::catch_unwind(AssertUnwindSafe(move || initializers.initialize()));

        assert!(result.is_err());
        assert_eq!(
            releases(&journal),
            vec!["release c", "release b", "release a"]
        );
    }

    #[test]
    fn test_exact_len() {
        assert_eq!(exact_len((3, Some(3))), Some(3));
        assert_eq!(exact_len((0, Some(4))), None);
        assert_eq!(exact_len((2, None)), None);
    }

    #[test]
    fn test_initialize_filtered_initializers() {
        let journal = Journal::default();
        let initializers = [
            succeed(&journal, "a", Key::First, "v1"),
            succeed(&journal, "b", Key::Second, "v2"),
        ];
        let keep = [true, true];

        let filtered = initializers
            .into_iter()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|(initializer, _)| initializer);
        assert_eq!(exact_len(filtered.size_hint()), None);

        let (_, releaser) = initialize(filtered).expect("initialize");
        releaser.release();

        assert_eq!(releases(&journal), vec!["release b", "release a"]);
    }

    #[test]
    fn test_initialize_mixed_initializers() {
        struct Pool {
            size: u32,
        }

        impl Initializer for Pool {
            type Error = Error;

            fn initialize(self, _ctx: &Context) -> Result<(Injector, Releaser), Error> {
                if self.size == 0 {
                    return Err(Error::new("pool size must be positive").resource("pool"));
                }
                Ok((Injector::singleton("pool", self.size), Releaser::noop()))
            }
        }

        let (injector, _) = Initializers::new()
            .with(Pool { size: 4 })
            .with(|ctx: &Context| -> Result<(Injector, Releaser), Error> {
                let size = *ctx.get::<u32>(&"pool").ok_or("pool missing")?;
                Ok((Injector::singleton("workers", size * 2), Releaser::noop()))
            })
            .initialize()
            .expect("initialize");

        let ctx = injector.inject(Context::background());
        assert_eq!(ctx.get::<u32>(&"workers"), Some(&8));

        let err = Initializers::new()
            .with(Pool { size: 0 })
            .initialize()
            .expect_err("must fail");
        assert_eq!(err.to_string(), "pool: pool size must be positive");
    }

    #[test]
    fn test_box_initializer() {
        let journal = Journal::default();
        let boxed = vec![
            box_initializer(succeed(&journal, "a", Key::First, "v1")),
            box_initializer(succeed(&journal, "b", Key::Second, "v2")),
        ];

        let (_, releaser) = initialize(boxed).expect("initialize");
        releaser.release();

        assert_eq!(releases(&journal), vec!["release b", "release a"]);
    }
}
