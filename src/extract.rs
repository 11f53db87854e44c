//! # User Extraction Functions
//!
//! Stages that need a user function (GroupCount key/value, Transform) name
//! an `Extractor` in their configuration. The names resolve against an
//! `ExtractorRegistry` handed to each task's setup. Unknown names fail at
//! setup, before any record is read.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::model::{GraphElement, Value};
use crate::{Error, Result};

/// Error type user functions may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A pure function from a graph element to a value.
///
/// Extractors are shared across tasks and must not carry mutable state.
pub trait Extractor: Send + Sync {
    fn extract(&self, element: GraphElement<'_>) -> std::result::Result<Value, BoxError>;
}

/// Reads one key through the reserved-key-aware picker.
#[derive(Debug, Clone)]
pub struct PropertyPicker {
    key: String,
}

impl PropertyPicker {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Extractor for PropertyPicker {
    fn extract(&self, element: GraphElement<'_>) -> std::result::Result<Value, BoxError> {
        Ok(element.try_pick(&self.key, "picker")?)
    }
}

struct FnExtractor<F>(F);

impl<F> Extractor for FnExtractor<F>
where
    F: Fn(GraphElement<'_>) -> std::result::Result<Value, BoxError> + Send + Sync,
{
    fn extract(&self, element: GraphElement<'_>) -> std::result::Result<Value, BoxError> {
        (self.0)(element)
    }
}

/// Named extractors available to task setup.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an extractor under `name`.
    pub fn register(&mut self, name: impl Into<String>, extractor: impl Extractor + 'static) -> &mut Self {
        self.extractors.insert(name.into(), Arc::new(extractor));
        self
    }

    /// Register an infallible closure.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(GraphElement<'_>) -> Value + Send + Sync + 'static,
    {
        self.register(
            name,
            FnExtractor(move |element: GraphElement<'_>| Ok::<Value, BoxError>(f(element))),
        )
    }

    /// Register a closure that may fail; its error fails the task.
    pub fn register_try_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(GraphElement<'_>) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.register(name, FnExtractor(f))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extractors.contains_key(name)
    }

    /// Look up the extractor named by configuration key `key`.
    pub fn resolve(&self, key: &str, name: &str) -> Result<Arc<dyn Extractor>> {
        self.extractors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(key, format!("unknown extractor '{name}'")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ExtractorRegistry").field("extractors", &names).finish()
    }
}

/// Run an extractor, reporting failure against the stage and element.
pub(crate) fn evaluate(
    extractor: &dyn Extractor,
    element: GraphElement<'_>,
    stage: &'static str,
) -> Result<Value> {
    extractor.extract(element).map_err(|e| Error::Evaluation {
        stage,
        element: element.micro(),
        message: e.to_string(),
    })
}
