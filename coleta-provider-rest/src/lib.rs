//! Provider implementation for the coleta catalog REST API.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET /regions` and `GET /regions/{code}/municipalities`
//! - `GET /categories`
//! - `GET /points?region=&municipality=&categories=1,2` and `GET /points/{id}`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use coleta_core::{
    model::{
        BackendId, BackendMeta, CategoryId, CollectionPoint, Coordinate, MaterialCategory,
        Municipality, PointDetail, PointId, QueryKey, Region, RegionCode,
    },
    plugin::BackendPlugin,
    ports::{MaterialCatalog, PointCatalog, PortError, RegionCatalog},
};

/// Identifier under which this backend is registered.
pub const BACKEND_ID: &str = "rest";

/// Entry from /regions
#[derive(Debug, Deserialize)]
struct RegionEntry {
    code: String,
}

/// Entry from /regions/{code}/municipalities
#[derive(Debug, Deserialize)]
struct MunicipalityEntry {
    name: String,
}

/// Entry from /categories
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryEntry {
    id: i64,
    label: String,
    icon_ref: String,
}

/// Entry from /points
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointEntry {
    id: i64,
    name: String,
    image_ref: String,
    coordinate: CoordinateEntry,
}

#[derive(Debug, Deserialize)]
struct CoordinateEntry {
    lat: f64,
    lng: f64,
}

/// Response from /points/{id}
#[derive(Debug, Deserialize)]
struct PointDetailResponse {
    point: PointEntry,
    #[serde(default)]
    items: Vec<ItemEntry>,
    email: Option<String>,
    whatsapp: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemEntry {
    label: String,
}

impl From<PointEntry> for CollectionPoint {
    fn from(entry: PointEntry) -> Self {
        CollectionPoint {
            id: PointId(entry.id),
            name: entry.name,
            image_ref: entry.image_ref,
            coordinate: Coordinate::new(entry.coordinate.lat, entry.coordinate.lng),
        }
    }
}

/// Region and municipality lookups.
pub struct RestRegionCatalog {
    client: Client,
    base_url: String,
}

impl RestRegionCatalog {
    /// Create a catalog bound to the given HTTP client and API root.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize(base_url),
        }
    }
}

#[async_trait]
impl RegionCatalog for RestRegionCatalog {
    async fn regions(&self) -> Result<Vec<Region>, PortError> {
        let req = self.client.get(endpoint(&self.base_url, &["regions"])?);
        let entries = fetch_json::<Vec<RegionEntry>>(req).await?;

        Ok(entries
            .into_iter()
            .map(|entry| Region {
                code: RegionCode(entry.code),
            })
            .collect())
    }

    async fn municipalities(&self, region: &RegionCode) -> Result<Vec<Municipality>, PortError> {
        let url = endpoint(&self.base_url, &["regions", region.0.as_str(), "municipalities"])?;
        let req = self.client.get(url);
        let entries = fetch_json::<Vec<MunicipalityEntry>>(req).await?;

        Ok(entries
            .into_iter()
            .map(|entry| Municipality { name: entry.name })
            .collect())
    }
}

/// Material category catalog.
pub struct RestMaterialCatalog {
    client: Client,
    base_url: String,
}

impl RestMaterialCatalog {
    /// Create a catalog bound to the given HTTP client and API root.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize(base_url),
        }
    }
}

#[async_trait]
impl MaterialCatalog for RestMaterialCatalog {
    async fn categories(&self) -> Result<Vec<MaterialCategory>, PortError> {
        let req = self.client.get(endpoint(&self.base_url, &["categories"])?);
        let entries = fetch_json::<Vec<CategoryEntry>>(req).await?;

        Ok(entries
            .into_iter()
            .map(|entry| MaterialCategory {
                id: CategoryId(entry.id),
                label: entry.label,
                icon_ref: entry.icon_ref,
            })
            .collect())
    }
}

/// Collection point queries.
pub struct RestPointCatalog {
    client: Client,
    base_url: String,
}

impl RestPointCatalog {
    /// Create a catalog bound to the given HTTP client and API root.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize(base_url),
        }
    }
}

#[async_trait]
impl PointCatalog for RestPointCatalog {
    async fn points(&self, query: &QueryKey) -> Result<Vec<CollectionPoint>, PortError> {
        let mut req = self.client.get(endpoint(&self.base_url, &["points"])?).query(&[
            ("region", query.region.0.as_str()),
            ("municipality", query.municipality.as_str()),
        ]);

        // No categories parameter means no filter on the server side.
        if !query.categories.is_empty() {
            req = req.query(&[("categories", query.categories_param())]);
        }

        let entries = fetch_json::<Vec<PointEntry>>(req).await?;
        Ok(entries.into_iter().map(CollectionPoint::from).collect())
    }

    async fn point_detail(&self, id: PointId) -> Result<PointDetail, PortError> {
        let req = self
            .client
            .get(endpoint(&self.base_url, &["points", id.to_string().as_str()])?);
        let detail = fetch_json::<PointDetailResponse>(req).await?;

        Ok(PointDetail {
            point: detail.point.into(),
            items: detail.items.into_iter().map(|item| item.label).collect(),
            email: detail.email,
            whatsapp: detail.whatsapp,
            address: detail.address,
        })
    }
}

/// Build the plugin bundle for the REST backend.
#[must_use]
pub fn plugin(client: Client, base_url: &str) -> BackendPlugin {
    let regions = Arc::new(RestRegionCatalog::new(client.clone(), base_url));
    let materials = Arc::new(RestMaterialCatalog::new(client.clone(), base_url));
    let points = Arc::new(RestPointCatalog::new(client, base_url));

    BackendPlugin {
        meta: backend_meta(),
        regions,
        materials,
        points,
    }
}

fn backend_meta() -> BackendMeta {
    BackendMeta {
        id: BackendId(String::from(BACKEND_ID)),
        name: String::from("Coleta REST API"),
    }
}

fn normalize(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_owned()
}

/// Append path segments to the base URL, percent-encoding each one.
fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, PortError> {
    let mut url = Url::parse(base_url)
        .map_err(|err| PortError::Internal(format!("invalid base url {base_url}: {err}")))?;
    url.path_segments_mut()
        .map_err(|()| PortError::Internal(format!("base url {base_url} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn transport_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Timeout
    } else {
        PortError::Network(err)
    }
}

// Send the request and decode JSON, mapping transport, status and body failures.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let resp = req.send().await.map_err(transport_error)?;

    let status = resp.status();
    tracing::debug!(url = %resp.url(), %status, "catalog response");
    if status == StatusCode::NOT_FOUND {
        return Err(PortError::NotFound);
    }
    if !status.is_success() {
        return Err(PortError::Status(status.as_u16()));
    }

    // Decode with serde_json directly so the error names the offending field.
    let body = resp.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body).map_err(|err| PortError::Decode(err.to_string()))
}
