//! Provider implementation for the Ecoleta backend.
//!
//! Regions and municipalities come from the IBGE localities API, materials
//! and points from the Ecoleta server.

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
pub const BACKEND_ID: &str = "ecoleta";

/// Public IBGE localities endpoint.
pub const IBGE_LOCALITIES_URL: &str = "https://servicodados.ibge.gov.br/api/v1/localidades";

/// State as returned by /estados
#[derive(Debug, Deserialize)]
struct State {
    sigla: String,
    // id, nome and regiao exist, we only need the initials
}

/// Municipality as returned by /estados/{UF}/municipios
#[derive(Debug, Deserialize)]
struct City {
    nome: String,
}

/// Item from /items
#[derive(Debug, Deserialize)]
struct Item {
    id: i64,
    title: String,
    #[serde(rename = "imageUrl", alias = "image_url")]
    image_url: String,
}

/// Point from /points and /points/{id}
///
/// The server sends the stored file name as `image` and, next to it, the
/// served address as `image_url`.
#[derive(Debug, Deserialize)]
struct Point {
    id: i64,
    name: String,
    #[serde(default)]
    image: String,
    image_url: Option<String>,
    latitude: f64,
    longitude: f64,
    email: Option<String>,
    whatsapp: Option<String>,
    city: Option<String>,
    uf: Option<String>,
}

/// Response from /points/{id}
#[derive(Debug, Deserialize)]
struct PointShowResponse {
    point: Point,
    #[serde(default)]
    items: Vec<PointItem>,
}

#[derive(Debug, Deserialize)]
struct PointItem {
    title: String,
}

impl Point {
    fn to_collection_point(&self) -> CollectionPoint {
        CollectionPoint {
            id: PointId(self.id),
            name: self.name.clone(),
            image_ref: self.image_url.clone().unwrap_or_else(|| self.image.clone()),
            coordinate: Coordinate::new(self.latitude, self.longitude),
        }
    }

    fn address(&self) -> Option<String> {
        match (self.city.as_deref(), self.uf.as_deref()) {
            (Some(city), Some(uf)) => Some(format!("{city}/{uf}")),
            (Some(city), None) => Some(city.to_owned()),
            (None, Some(uf)) => Some(uf.to_owned()),
            (None, None) => None,
        }
    }
}

/// Region lookups backed by IBGE.
pub struct IbgeRegionCatalog {
    client: Client,
    base_url: String,
}

impl IbgeRegionCatalog {
    /// Create a catalog bound to the given HTTP client and localities root.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize(base_url),
        }
    }
}

#[async_trait]
impl RegionCatalog for IbgeRegionCatalog {
    async fn regions(&self) -> Result<Vec<Region>, PortError> {
        let url = endpoint(&self.base_url, &["estados"])?;
        let states = fetch_json::<Vec<State>>(self.client.get(url)).await?;

        let mut regions: Vec<Region> = states
            .into_iter()
            .map(|state| Region {
                code: RegionCode(state.sigla),
            })
            .collect();
        regions.sort_by(|left, right| left.code.cmp(&right.code));

        Ok(regions)
    }

    async fn municipalities(&self, region: &RegionCode) -> Result<Vec<Municipality>, PortError> {
        let url = endpoint(&self.base_url, &["estados", region.0.as_str(), "municipios"])?;
        let cities = fetch_json::<Vec<City>>(self.client.get(url)).await?;

        Ok(cities
            .into_iter()
            .map(|city| Municipality { name: city.nome })
            .collect())
    }
}

/// Material catalog served by /items.
pub struct EcoletaMaterialCatalog {
    client: Client,
    base_url: String,
}

impl EcoletaMaterialCatalog {
    /// Create a catalog bound to the given HTTP client and Ecoleta server.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize(base_url),
        }
    }
}

#[async_trait]
impl MaterialCatalog for EcoletaMaterialCatalog {
    async fn categories(&self) -> Result<Vec<MaterialCategory>, PortError> {
        let url = endpoint(&self.base_url, &["items"])?;
        let items = fetch_json::<Vec<Item>>(self.client.get(url)).await?;

        Ok(items
            .into_iter()
            .map(|item| MaterialCategory {
                id: CategoryId(item.id),
                label: item.title,
                icon_ref: item.image_url,
            })
            .collect())
    }
}

/// Point catalog served by /points.
pub struct EcoletaPointCatalog {
    client: Client,
    base_url: String,
}

impl EcoletaPointCatalog {
    /// Create a catalog bound to the given HTTP client and Ecoleta server.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize(base_url),
        }
    }
}

#[async_trait]
impl PointCatalog for EcoletaPointCatalog {
    async fn points(&self, query: &QueryKey) -> Result<Vec<CollectionPoint>, PortError> {
        // Ecoleta names the municipality "city" and the region "uf".
        let mut req = self.client.get(endpoint(&self.base_url, &["points"])?).query(&[
            ("city", query.municipality.as_str()),
            ("uf", query.region.0.as_str()),
        ]);
        if !query.categories.is_empty() {
            req = req.query(&[("items", query.categories_param())]);
        }

        let points = fetch_json::<Vec<Point>>(req).await?;
        Ok(points.iter().map(Point::to_collection_point).collect())
    }

    async fn point_detail(&self, id: PointId) -> Result<PointDetail, PortError> {
        let url = endpoint(&self.base_url, &["points", id.to_string().as_str()])?;
        let show = fetch_json::<PointShowResponse>(self.client.get(url)).await?;

        Ok(PointDetail {
            point: show.point.to_collection_point(),
            items: show.items.into_iter().map(|item| item.title).collect(),
            address: show.point.address(),
            email: show.point.email,
            whatsapp: show.point.whatsapp,
        })
    }
}

/// Build the plugin bundle for the Ecoleta backend.
#[must_use]
pub fn plugin(client: Client, api_url: &str, localities_url: &str) -> BackendPlugin {
    let regions = Arc::new(IbgeRegionCatalog::new(client.clone(), localities_url));
    let materials = Arc::new(EcoletaMaterialCatalog::new(client.clone(), api_url));
    let points = Arc::new(EcoletaPointCatalog::new(client, api_url));

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
        name: String::from("Ecoleta"),
    }
}

fn normalize(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_owned()
}

// Segments are percent-encoded, so a region code cannot add path parts or a query.
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

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let resp = req.send().await.map_err(transport_error)?;

    let status = resp.status();
    tracing::debug!(url = %resp.url(), %status, "ecoleta response");
    match status {
        StatusCode::NOT_FOUND => Err(PortError::NotFound),
        status if !status.is_success() => Err(PortError::Status(status.as_u16())),
        _ => {
            let body = resp.bytes().await.map_err(transport_error)?;
            serde_json::from_slice(&body).map_err(|err| PortError::Decode(err.to_string()))
        }
    }
}
