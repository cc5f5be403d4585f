use std::sync::{Arc, Mutex};

use crate::{Context, Injector, Releaser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    First,
    Second,
    Third,
}

/// Records the order in which injectors, initializers and releasers run.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn releaser(&self, name: &'static str) -> Releaser {
        let journal = self.clone();
        Releaser::new(move || journal.record(format!("release {name}")))
    }

    /// An injector binding `key → value` that records the keys it saw bound.
    pub fn injector(&self, name: &'static str, key: Key, value: &'static str) -> Injector {
        let journal = self.clone();
        Injector::new(move |ctx: Context| {
            let seen = [Key::First, Key::Second, Key::Third]
                .into_iter()
                .filter(|key| ctx.contains(key))
                .map(|key| format!("{key:?}"))
                .collect::<Vec<_>>();
            journal.record(format!("inject {name} {seen:?}"));
            ctx.with_value(key, value)
        })
    }
}
