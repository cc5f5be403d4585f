use std::{
    any::{Any, type_name},
    fmt,
    panic::{self, AssertUnwindSafe},
};

use rigging_error::{BoxError, Error};
use tracing::{error, warn};

/// Releases a previously acquired resource.
///
/// Releasing must not fail from the caller's point of view: any error is
/// handled inside. Implemented for every `FnOnce() + Send`.
pub trait Release: Send {
    fn release(self);
}

impl<F> Release for F
where
    F: FnOnce() + Send,
{
    fn release(self) {
        (self)()
    }
}

/// A resource that can be closed, possibly failing.
pub trait Close {
    type Error: Into<BoxError>;

    fn close(self) -> Result<(), Self::Error>;
}

/// An owned, type-erased [`Release`], consumed when invoked.
pub struct Releaser {
    inner: Box<dyn FnOnce() + Send>,
}

impl Releaser {
    pub fn new<T>(release: T) -> Releaser
    where
        T: Release + 'static,
    {
        Releaser {
            inner: Box::new(move || release.release()),
        }
    }

    pub fn noop() -> Releaser {
        Releaser::new(|| {})
    }

    /// Composes `releasers`, given in acquisition order, into one that
    /// invokes them in reverse order.
    ///
    /// Every releaser is invoked, even if an earlier one panics; the panic is
    /// logged and swallowed.
    ///
    /// # Example
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use rigging::Releaser;
    ///
    /// let order = Arc::new(Mutex::new(Vec::new()));
    /// let push = |n| {
    ///     let order = order.clone();
    ///     Releaser::new(move || order.lock().unwrap().push(n))
    /// };
    ///
    /// Releaser::all([push(1), push(2), push(3)]).release();
    /// assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
    /// ```
    pub fn all<I>(releasers: I) -> Releaser
    where
        I: IntoIterator<Item = Releaser>,
    {
        let releasers = releasers.into_iter().collect::<Vec<_>>();
        if releasers.is_empty() {
            return Releaser::noop();
        }
        Releaser::new(move || release_reverse(releasers))
    }

    /// Closes `resource`, logging and discarding a close failure.
    pub fn close<T>(resource: T) -> Releaser
    where
        T: Close + Send + 'static,
    {
        Releaser::close_with(resource, |err| {
            warn!(error = %err, "failed to close resource");
        })
    }

    /// Closes `resource`, handing a close failure to `observer` instead of
    /// returning it.
    pub fn close_with<T, F>(resource: T, observer: F) -> Releaser
    where
        T: Close + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        Releaser::new(move || {
            if let Err(err) = resource.close() {
                observer(Error::new(err).resource(type_name::<T>()));
            }
        })
    }

    pub fn release(self) {
        Release::release(self)
    }

    /// Wraps the releaser in a guard that releases it when dropped.
    pub fn guard(self) -> ReleaseGuard {
        ReleaseGuard {
            releaser: Some(self),
        }
    }
}

impl Release for Releaser {
    fn release(self) {
        (self.inner)()
    }
}

impl FromIterator<Releaser> for Releaser {
    fn from_iter<T: IntoIterator<Item = Releaser>>(iter: T) -> Self {
        Releaser::all(iter)
    }
}

impl Default for Releaser {
    fn default() -> Self {
        Releaser::noop()
    }
}

impl fmt::Debug for Releaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Releaser").finish_non_exhaustive()
    }
}

pub(crate) fn release_reverse(releasers: Vec<Releaser>) {
    for (index, releaser) in releasers.into_iter().enumerate().rev() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || releaser.release())) {
            error!(
                index,
                panic = panic_message(&*payload),
                "releaser panicked, continuing with the remaining releasers"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "Box<dyn Any>"
    }
}

/// Releases the wrapped [`Releaser`] on drop unless disarmed.
#[must_use = "dropping the guard releases immediately"]
#[derive(Debug)]
pub struct ReleaseGuard {
    releaser: Option<Releaser>,
}

impl ReleaseGuard {
    pub fn release(mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release();
        }
    }

    /// Gives the releaser back without invoking it.
    pub fn disarm(mut self) -> Releaser {
        self.releaser.take().unwrap_or_default()
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release();
        }
    }
}
