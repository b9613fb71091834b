//! Source Registry
//!
//! Explicit kind → constructor table. Nothing registers itself; callers
//! start from [`SourceRegistry::with_builtin`] or an empty registry.

use std::collections::HashMap;
use tracing::debug;

use super::historian::HistorianSource;
use super::{DataSource, SourceError, SourceSettings};

/// Builds a source from its stored settings
pub type SourceConstructor = fn(&SourceSettings) -> Result<Box<dyn DataSource>, SourceError>;

/// Maps source kinds to constructors
#[derive(Clone, Default)]
pub struct SourceRegistry {
    constructors: HashMap<String, SourceConstructor>,
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every source shipped in this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(HistorianSource::KIND, HistorianSource::build);
        registry
    }

    /// Register a constructor; kinds are matched case-insensitively
    pub fn register(&mut self, kind: &str, constructor: SourceConstructor) {
        self.constructors.insert(kind.to_lowercase(), constructor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(&kind.to_lowercase())
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Construct a source of `kind`
    pub fn build(
        &self,
        kind: &str,
        settings: &SourceSettings,
    ) -> Result<Box<dyn DataSource>, SourceError> {
        let constructor = self
            .constructors
            .get(&kind.to_lowercase())
            .ok_or_else(|| SourceError::UnknownKind(kind.to_string()))?;

        debug!(kind = %kind, "Building data source");
        constructor(settings)
    }
}
