//! High-level service facade combining a backend, the device location and the coordinator.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time;

use crate::coordinator::{CoordinatorConfig, DiscoveryCoordinator};
use crate::model::{
    BackendId, BackendMeta, DeviceCoordinate, MaterialCategory, PointDetail, PointId, Region,
    UnavailableReason, Viewport,
};
use crate::plugin::{BackendPlugin, BackendRegistry};
use crate::ports::{GeolocationProvider, LocationError, PortError};

#[derive(Debug, Clone, Default)]
/// Option lists needed before the user can build a query.
pub struct CatalogOptions {
    /// Every selectable region.
    pub regions: Vec<Region>,
    /// Every material category.
    pub categories: Vec<MaterialCategory>,
}

/// Public entry point for one discovery session.
pub struct DiscoveryService {
    plugin: BackendPlugin,
    geolocation: Arc<dyn GeolocationProvider>,
    coordinator: DiscoveryCoordinator,
    fetch_timeout: Duration,
    device: OnceCell<DeviceCoordinate>,
}

impl DiscoveryService {
    /// Create a session bound to one backend.
    #[must_use]
    pub fn new(
        plugin: BackendPlugin,
        geolocation: Arc<dyn GeolocationProvider>,
        config: CoordinatorConfig,
    ) -> Self {
        let coordinator = DiscoveryCoordinator::new(
            Arc::clone(&plugin.regions),
            Arc::clone(&plugin.points),
            config,
        );
        Self {
            plugin,
            geolocation,
            coordinator,
            fetch_timeout: config.query_timeout,
            device: OnceCell::new(),
        }
    }

    /// Create a session for a backend looked up in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownBackend`] if the backend is not registered.
    pub fn from_registry(
        registry: &BackendRegistry,
        backend: &BackendId,
        geolocation: Arc<dyn GeolocationProvider>,
        config: CoordinatorConfig,
    ) -> Result<Self, PortError> {
        let plugin = registry.plugin(backend)?.clone();
        Ok(Self::new(plugin, geolocation, config))
    }

    /// Backend this session talks to.
    #[must_use]
    pub fn backend(&self) -> &BackendMeta {
        &self.plugin.meta
    }

    /// The session's coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &DiscoveryCoordinator {
        &self.coordinator
    }

    /// Fetch regions and material categories in parallel and install the
    /// category catalog into the coordinator.
    ///
    /// # Errors
    ///
    /// Returns the first [`PortError`] of either fetch; a timeout is
    /// reported as [`PortError::Timeout`].
    pub async fn load_options(&self) -> Result<CatalogOptions, PortError> {
        let (regions, categories) = tokio::join!(
            self.bounded(self.plugin.regions.regions()),
            self.bounded(self.plugin.materials.categories()),
        );
        let regions = regions?;
        let categories = categories?;

        tracing::info!(
            backend = %self.plugin.meta.id,
            regions = regions.len(),
            categories = categories.len(),
            "catalog options loaded"
        );
        self.coordinator.set_catalog(&categories);

        Ok(CatalogOptions {
            regions,
            categories,
        })
    }

    /// Resolve the device position. Only the first call reaches the provider;
    /// later calls return the same outcome.
    pub async fn locate(&self) -> DeviceCoordinate {
        *self
            .device
            .get_or_init(|| async {
                match time::timeout(self.fetch_timeout, self.geolocation.resolve()).await {
                    Ok(Ok(coordinate)) => {
                        tracing::info!(
                            latitude = coordinate.latitude,
                            longitude = coordinate.longitude,
                            "device located"
                        );
                        DeviceCoordinate::Available(coordinate)
                    }
                    Ok(Err(LocationError::PermissionDenied)) => {
                        tracing::warn!("location permission denied; map starts without a position");
                        DeviceCoordinate::Unavailable(UnavailableReason::PermissionDenied)
                    }
                    Ok(Err(LocationError::Unavailable(reason))) => {
                        tracing::warn!(%reason, "location unavailable");
                        DeviceCoordinate::Unavailable(UnavailableReason::SensorError)
                    }
                    Err(_elapsed) => {
                        tracing::warn!("location lookup timed out");
                        DeviceCoordinate::Unavailable(UnavailableReason::SensorError)
                    }
                }
            })
            .await
    }

    /// Initial map viewport, centred on the device when it could be located.
    pub async fn initial_viewport(&self) -> Viewport {
        Viewport::from(self.locate().await)
    }

    /// Load the full description of one point.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the point is unknown or the request fails.
    pub async fn point_detail(&self, id: PointId) -> Result<PointDetail, PortError> {
        self.bounded(self.plugin.points.point_detail(id)).await
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, PortError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        time::timeout(self.fetch_timeout, request)
            .await
            .unwrap_or(Err(PortError::Timeout))
    }
}
