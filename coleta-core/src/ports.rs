//! Traits describing the catalog and location backends, plus their error types.

use std::fmt;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};

use crate::model::{
    CollectionPoint, Coordinate, MaterialCategory, Municipality, PointDetail, PointId, QueryKey,
    Region, RegionCode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Coarse failure classification exposed to presentation.
pub enum ErrorKind {
    /// Transport failure or timeout.
    Network,
    /// The backend answered with a non-success status or an unusable body.
    Server,
    /// The user refused the location permission.
    PermissionDenied,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::PermissionDenied => "permission denied",
        };
        formatter.write_str(label)
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to catalog backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// No response arrived within the configured bound.
    #[error("Request timed out")]
    Timeout,
    /// Backend answered with a non-success status code.
    #[error("Server returned status {0}")]
    Status(u16),
    /// Backend response could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),
    /// Requested resource does not exist.
    #[error("Not found")]
    NotFound,
    /// No backend is registered under the requested id.
    #[error("Unsupported backend")]
    UnknownBackend,
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortError {
    /// Classify the failure for presentation.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortError::Network(err) if err.is_status() || err.is_decode() => ErrorKind::Server,
            PortError::Network(_) | PortError::Timeout => ErrorKind::Network,
            PortError::Status(_)
            | PortError::Decode(_)
            | PortError::NotFound
            | PortError::UnknownBackend
            | PortError::Internal(_) => ErrorKind::Server,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a device position could not be resolved.
pub enum LocationError {
    /// The user refused the permission prompt.
    #[error("Location permission denied")]
    PermissionDenied,
    /// The sensor failed.
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
/// Source of administrative regions and their municipalities.
pub trait RegionCatalog: Send + Sync {
    /// List every top-level region.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend request fails.
    async fn regions(&self) -> Result<Vec<Region>, PortError>;

    /// List the municipalities of one region.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend request fails.
    async fn municipalities(&self, region: &RegionCode) -> Result<Vec<Municipality>, PortError>;
}

#[async_trait]
/// Source of the static recyclable-material catalog.
pub trait MaterialCatalog: Send + Sync {
    /// List every material category.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend request fails.
    async fn categories(&self) -> Result<Vec<MaterialCategory>, PortError>;
}

#[async_trait]
/// Source of collection points.
pub trait PointCatalog: Send + Sync {
    /// Points in the key's municipality accepting any of its categories.
    ///
    /// An empty category set means no filter.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend request fails.
    async fn points(&self, query: &QueryKey) -> Result<Vec<CollectionPoint>, PortError>;

    /// Full description of a single point.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] for unknown ids, or another [`PortError`]
    /// when the backend request fails.
    async fn point_detail(&self, id: PointId) -> Result<PointDetail, PortError>;
}

#[async_trait]
/// One-shot device position lookup.
pub trait GeolocationProvider: Send + Sync {
    /// Ask for permission and return the current position.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] on denial or sensor failure.
    async fn resolve(&self) -> Result<Coordinate, LocationError>;
}
