//! Lazy handle on a distribution inside a data source.

use std::fmt;
use std::rc::Rc;

use pit_core::{Error, Memo, Result};

use crate::histogram::Distribution;
use crate::source::DataSource;
use crate::transform::Transform;

/// A named distribution in a [`DataSource`], plus the transform to apply.
///
/// The distribution is read and transformed on the first [`HistKey::load`]
/// and cached until [`HistKey::clear`].
pub struct HistKey {
    source: Rc<dyn DataSource>,
    name: String,
    transform: Transform,
    cache: Memo<Distribution>,
}

impl HistKey {
    /// Create a handle (nothing is read yet).
    pub fn new(source: Rc<dyn DataSource>, name: impl Into<String>, transform: Transform) -> Self {
        Self { source, name: name.into(), transform, cache: Memo::new() }
    }

    /// Histogram name inside the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing source.
    pub fn source(&self) -> &Rc<dyn DataSource> {
        &self.source
    }

    /// Transform applied on load.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Same source and transform, different histogram name (fresh cache).
    pub fn with_name(&self, name: impl Into<String>) -> HistKey {
        HistKey::new(Rc::clone(&self.source), name, self.transform)
    }

    /// Same name and transform, different source (fresh cache).
    pub fn with_source(&self, source: Rc<dyn DataSource>) -> HistKey {
        HistKey::new(source, self.name.clone(), self.transform)
    }

    /// Materialize the distribution (cached after the first call).
    pub fn load(&self) -> Result<Rc<Distribution>> {
        self.cache.get_or_try_init(|| {
            let raw = match self.source.fetch(&self.name) {
                Ok(Some(d)) => d,
                Ok(None) => return Err(self.unavailable("not found")),
                Err(e) => return Err(self.unavailable(&e.to_string())),
            };
            self.transform.apply(raw)
        })
    }

    /// The cached distribution, if loaded.
    pub fn get(&self) -> Option<Rc<Distribution>> {
        self.cache.get()
    }

    /// Whether the distribution is in memory.
    pub fn is_loaded(&self) -> bool {
        self.cache.is_set()
    }

    /// Release the cached distribution. Returns `true` if one was held.
    pub fn clear(&self) -> bool {
        self.cache.clear()
    }

    fn unavailable(&self, reason: &str) -> Error {
        Error::DataUnavailable {
            source_id: self.source.id().to_string(),
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Debug for HistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistKey")
            .field("source", &self.source.id())
            .field("name", &self.name)
            .field("transform", &self.transform)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
