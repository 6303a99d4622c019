use async_trait::async_trait;
use coleta_core::{
    model::Coordinate,
    ports::{GeolocationProvider, LocationError},
};

/// Terminal stand-in for the device sensor: a position from the command line.
///
/// Without a configured position the lookup behaves like a refused permission.
pub(crate) struct ConfiguredLocation {
    position: Option<Coordinate>,
}

impl ConfiguredLocation {
    pub(crate) fn new(position: Option<Coordinate>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl GeolocationProvider for ConfiguredLocation {
    async fn resolve(&self) -> Result<Coordinate, LocationError> {
        self.position.ok_or(LocationError::PermissionDenied)
    }
}
