#![no_std]

extern crate alloc;

use alloc::{borrow::Cow, boxed::Box, vec::Vec};
use core::fmt;

pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A boxed error annotated with the resource it concerns and free-form
/// key/value pairs.
///
/// Annotations are kept in insertion order and rendered after the message.
#[derive(Debug)]
pub struct Error {
    inner: BoxError,
    resource: Option<Cow<'static, str>>,
    values: Vec<(Cow<'static, str>, Cow<'static, str>)>,
}

impl Error {
    pub fn new<T: Into<BoxError>>(error: T) -> Error {
        Error {
            inner: error.into(),
            resource: None,
            values: Vec::new(),
        }
    }

    /// Names the resource this error concerns, e.g. `"postgres"`.
    pub fn resource(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.resource = Some(name.into());
        self
    }

    pub fn value(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn get_ref(&self) -> &(dyn core::error::Error + Send + Sync + 'static) {
        &*self.inner
    }

    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(resource) = &self.resource {
            write!(f, "{resource}: ")?;
        }

        write!(f, "{}", self.inner)?;

        if !self.values.is_empty() {
            write!(f, " [")?;
            for (idx, (key, value)) in self.values.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, "]")?;
        }

        Ok(())
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<BoxError> for Error {
    fn from(value: BoxError) -> Self {
        Error::new(value)
    }
}

impl From<&'static str> for Error {
    fn from(value: &'static str) -> Self {
        Error::new(value)
    }
}
