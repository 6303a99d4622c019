//! Domain data structures for regions, material categories, and collection points.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a top-level administrative region, e.g. `"MG"`.
pub struct RegionCode(pub String);

impl fmt::Display for RegionCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for RegionCode {
    fn from(code: &str) -> Self {
        RegionCode(code.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Administrative region offered for selection.
pub struct Region {
    /// Region identifier.
    pub code: RegionCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Municipality inside exactly one region.
pub struct Municipality {
    /// Display name, also used as the query value.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a recyclable-material category.
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Category of recyclable material a collection point may accept.
pub struct MaterialCategory {
    /// Unique identifier.
    pub id: CategoryId,
    /// Human-friendly label such as "Lâmpadas".
    pub label: String,
    /// Reference to the category icon.
    pub icon_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a collection point.
pub struct PointId(pub i64);

impl fmt::Display for PointId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// WGS84 position in decimal degrees.
pub struct Coordinate {
    /// Latitude, -90 to 90.
    pub latitude: f64,
    /// Longitude, -180 to 180.
    pub longitude: f64,
}

impl Coordinate {
    /// Construct a coordinate from latitude and longitude.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Physical location accepting some recyclable materials.
pub struct CollectionPoint {
    /// Unique identifier.
    pub id: PointId,
    /// Name of the establishment.
    pub name: String,
    /// Reference to a picture of the place.
    pub image_ref: String,
    /// Where the point is.
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Full description of a single collection point.
pub struct PointDetail {
    /// The point itself.
    pub point: CollectionPoint,
    /// Labels of the materials the point accepts.
    pub items: Vec<String>,
    /// Contact e-mail, when published.
    pub email: Option<String>,
    /// `WhatsApp` number, when published.
    pub whatsapp: Option<String>,
    /// Free-form address line such as "Belo Horizonte/MG".
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Why the device position could not be obtained.
pub enum UnavailableReason {
    /// The user refused the location permission.
    PermissionDenied,
    /// The sensor failed or timed out.
    SensorError,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Outcome of the one-shot device location lookup.
pub enum DeviceCoordinate {
    /// A position was resolved.
    Available(Coordinate),
    /// No position for this session.
    Unavailable(UnavailableReason),
}

impl DeviceCoordinate {
    /// Coordinate when one was resolved.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            DeviceCoordinate::Available(coordinate) => Some(*coordinate),
            DeviceCoordinate::Unavailable(_) => None,
        }
    }
}

/// Latitude/longitude span of the initial map viewport, in degrees.
pub const DEFAULT_VIEWPORT_SPAN: f64 = 0.014;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Initial map viewport derived from the device location.
pub enum Viewport {
    /// Viewport centred on the device.
    Centered {
        /// Centre of the map.
        center: Coordinate,
        /// Latitude span in degrees.
        latitude_delta: f64,
        /// Longitude span in degrees.
        longitude_delta: f64,
    },
    /// Location unavailable; presentation falls back to an empty map.
    Unavailable,
}

impl From<DeviceCoordinate> for Viewport {
    fn from(device: DeviceCoordinate) -> Self {
        match device {
            DeviceCoordinate::Available(center) => Viewport::Centered {
                center,
                latitude_delta: DEFAULT_VIEWPORT_SPAN,
                longitude_delta: DEFAULT_VIEWPORT_SPAN,
            },
            DeviceCoordinate::Unavailable(_) => Viewport::Unavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Everything that identifies one logical point query.
///
/// Categories are kept in a sorted set so two keys compare equal regardless
/// of the order in which categories were selected.
pub struct QueryKey {
    /// Selected region.
    pub region: RegionCode,
    /// Selected municipality inside `region`.
    pub municipality: String,
    /// Category filter; empty means "every category".
    pub categories: BTreeSet<CategoryId>,
}

impl QueryKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new<M, I>(region: RegionCode, municipality: M, categories: I) -> Self
    where
        M: Into<String>,
        I: IntoIterator<Item = CategoryId>,
    {
        Self {
            region,
            municipality: municipality.into(),
            categories: categories.into_iter().collect(),
        }
    }

    /// Category ids joined with commas, in ascending order.
    #[must_use]
    pub fn categories_param(&self) -> String {
        self.categories
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a catalog backend known to coleta.
pub struct BackendId(pub String);

impl fmt::Display for BackendId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a backend and its human-friendly name.
pub struct BackendMeta {
    /// Unique identifier.
    pub id: BackendId,
    /// Display name.
    pub name: String,
}
