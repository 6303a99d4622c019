//! Registry for catalog backends and the ports they provide.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{BackendId, BackendMeta};
use crate::ports::{MaterialCatalog, PointCatalog, PortError, RegionCatalog};

/// Collection of ports talking to a single backend.
#[derive(Clone)]
pub struct BackendPlugin {
    /// Static metadata describing the backend.
    pub meta: BackendMeta,
    /// Region and municipality lookups.
    pub regions: Arc<dyn RegionCatalog>,
    /// Material category catalog.
    pub materials: Arc<dyn MaterialCatalog>,
    /// Collection point queries.
    pub points: Arc<dyn PointCatalog>,
}

/// Registry that resolves plugins by backend identifier.
pub struct BackendRegistry {
    plugins: HashMap<BackendId, BackendPlugin>,
}

impl BackendRegistry {
    /// Build a registry from the provided plugin list.
    #[must_use]
    pub fn new(plugins: Vec<BackendPlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (plugin.meta.id.clone(), plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Metadata for all registered backends, sorted by id.
    #[must_use]
    pub fn backends(&self) -> Vec<BackendMeta> {
        let mut backends: Vec<BackendMeta> = self
            .plugins
            .values()
            .map(|plugin| plugin.meta.clone())
            .collect();
        backends.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        backends
    }

    /// Look up the plugin for a backend.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownBackend`] when no plugin is registered.
    pub fn plugin(&self, backend: &BackendId) -> Result<&BackendPlugin, PortError> {
        self.plugins.get(backend).ok_or(PortError::UnknownBackend)
    }
}
