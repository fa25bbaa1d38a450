//! Registry for the slot sources that seed the catalog.

use std::sync::Arc;

use crate::ports::{SlotSource, SourceError, SourceId, SourceMeta};

/// A slot source together with its metadata.
pub struct SourcePlugin {
    /// Static metadata describing the source.
    pub meta: SourceMeta,
    /// Implementation delivering slot definitions.
    pub source: Arc<dyn SlotSource>,
}

/// Registry of sources, kept in registration order.
///
/// Order matters: when two sources define the same slot, the earlier one wins.
pub struct SourceRegistry {
    plugins: Vec<SourcePlugin>,
}

impl SourceRegistry {
    /// Build a registry from the provided plugin list.
    #[must_use]
    pub fn new(plugins: Vec<SourcePlugin>) -> Self {
        Self { plugins }
    }

    /// Return metadata for all registered sources.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceMeta> {
        self.plugins
            .iter()
            .map(|plugin| plugin.meta.clone())
            .collect()
    }

    /// Iterator over the registered plugins in registration order.
    pub fn plugins_iter(&self) -> impl Iterator<Item = &SourcePlugin> {
        self.plugins.iter()
    }

    /// Look up a plugin by id.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownSource`] when no plugin is registered.
    pub fn plugin(&self, id: &SourceId) -> Result<&SourcePlugin, SourceError> {
        self.plugins
            .iter()
            .find(|plugin| &plugin.meta.id == id)
            .ok_or_else(|| SourceError::UnknownSource(id.clone()))
    }

    /// Whether no source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
