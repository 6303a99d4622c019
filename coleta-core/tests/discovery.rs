//! Coordinator and service behaviour against in-memory catalogs.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time;

use coleta_core::{
    BackendId, BackendMeta, BackendPlugin, BackendRegistry, CategoryId, CollectionPoint,
    Coordinate, CoordinatorConfig, DeviceCoordinate, DiscoveryCoordinator, DiscoveryService,
    ErrorKind, GeolocationProvider, LocationError, MaterialCatalog, MaterialCategory,
    Municipality, PointCatalog, PointDetail, PointId, PortError, QueryKey, QueryStatus, Region,
    RegionCatalog, RegionCode, UnavailableReason, Viewport,
};

type PointsResult = Result<Vec<CollectionPoint>, PortError>;

struct StaticRegions {
    municipalities: HashMap<String, Vec<Municipality>>,
}

impl StaticRegions {
    fn new() -> Arc<Self> {
        let municipalities = [
            ("MG", vec!["Belo Horizonte", "Contagem"]),
            ("SP", vec!["Campinas", "Santos", "São Paulo"]),
        ]
        .into_iter()
        .map(|(code, names)| {
            let list = names
                .into_iter()
                .map(|name| Municipality {
                    name: name.to_owned(),
                })
                .collect();
            (code.to_owned(), list)
        })
        .collect();
        Arc::new(Self { municipalities })
    }
}

#[async_trait]
impl RegionCatalog for StaticRegions {
    async fn regions(&self) -> Result<Vec<Region>, PortError> {
        let mut codes: Vec<&String> = self.municipalities.keys().collect();
        codes.sort();
        Ok(codes
            .into_iter()
            .map(|code| Region {
                code: RegionCode(code.clone()),
            })
            .collect())
    }

    async fn municipalities(&self, region: &RegionCode) -> Result<Vec<Municipality>, PortError> {
        self.municipalities
            .get(&region.0)
            .cloned()
            .ok_or(PortError::NotFound)
    }
}

/// Never answers; only the caller's timeout ends the wait.
struct StalledRegions;

#[async_trait]
impl RegionCatalog for StalledRegions {
    async fn regions(&self) -> Result<Vec<Region>, PortError> {
        future::pending().await
    }

    async fn municipalities(&self, _region: &RegionCode) -> Result<Vec<Municipality>, PortError> {
        future::pending().await
    }
}

struct StaticMaterials {
    categories: Result<Vec<MaterialCategory>, u16>,
}

#[async_trait]
impl MaterialCatalog for StaticMaterials {
    async fn categories(&self) -> Result<Vec<MaterialCategory>, PortError> {
        self.categories.clone().map_err(PortError::Status)
    }
}

/// Answers like the real service: a point matches when it accepts any
/// requested category, and an empty filter matches everything.
struct FilteringPoints {
    stock: Vec<(CollectionPoint, Vec<CategoryId>)>,
    calls: Mutex<Vec<QueryKey>>,
}

impl FilteringPoints {
    fn new(stock: Vec<(CollectionPoint, Vec<CategoryId>)>) -> Arc<Self> {
        Arc::new(Self {
            stock,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<QueryKey> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl PointCatalog for FilteringPoints {
    async fn points(&self, query: &QueryKey) -> PointsResult {
        self.calls.lock().expect("calls lock").push(query.clone());
        Ok(self
            .stock
            .iter()
            .filter(|(_, accepts)| {
                query.categories.is_empty()
                    || accepts.iter().any(|id| query.categories.contains(id))
            })
            .map(|(point, _)| point.clone())
            .collect())
    }

    async fn point_detail(&self, id: PointId) -> Result<PointDetail, PortError> {
        let (point, accepts) = self
            .stock
            .iter()
            .find(|(point, _)| point.id == id)
            .ok_or(PortError::NotFound)?;
        Ok(PointDetail {
            point: point.clone(),
            items: accepts.iter().map(ToString::to_string).collect(),
            email: None,
            whatsapp: None,
            address: Some("Belo Horizonte/MG".to_owned()),
        })
    }
}

/// Every call waits for the test to release the matching response.
struct GatedPoints {
    gates: Mutex<VecDeque<oneshot::Receiver<PointsResult>>>,
    calls: Mutex<Vec<QueryKey>>,
}

impl GatedPoints {
    fn new(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<PointsResult>>) {
        let (senders, receivers): (Vec<_>, VecDeque<_>) =
            (0..count).map(|_| oneshot::channel()).unzip();
        let points = Arc::new(Self {
            gates: Mutex::new(receivers),
            calls: Mutex::new(Vec::new()),
        });
        (points, senders)
    }

    fn calls(&self) -> Vec<QueryKey> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl PointCatalog for GatedPoints {
    async fn points(&self, query: &QueryKey) -> PointsResult {
        self.calls.lock().expect("calls lock").push(query.clone());
        let gate = self.gates.lock().expect("gates lock").pop_front();
        match gate {
            Some(gate) => gate
                .await
                .unwrap_or_else(|_| Err(PortError::Internal("gate dropped".into()))),
            None => Err(PortError::Internal("unexpected call".into())),
        }
    }

    async fn point_detail(&self, _id: PointId) -> Result<PointDetail, PortError> {
        Err(PortError::NotFound)
    }
}

struct FixedLocation {
    outcome: Result<Coordinate, LocationError>,
    calls: AtomicUsize,
}

impl FixedLocation {
    fn new(outcome: Result<Coordinate, LocationError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GeolocationProvider for FixedLocation {
    async fn resolve(&self) -> Result<Coordinate, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A sensor that never reports.
struct SilentLocation;

#[async_trait]
impl GeolocationProvider for SilentLocation {
    async fn resolve(&self) -> Result<Coordinate, LocationError> {
        future::pending().await
    }
}

fn point(id: i64) -> CollectionPoint {
    CollectionPoint {
        id: PointId(id),
        name: format!("Ponto {id}"),
        image_ref: format!("https://images.example/{id}.jpg"),
        coordinate: Coordinate::new(-19.92, -43.94),
    }
}

fn points(ids: &[i64]) -> Vec<CollectionPoint> {
    ids.iter().copied().map(point).collect()
}

fn categories() -> Vec<MaterialCategory> {
    [
        (1, "Lâmpadas"),
        (2, "Pilhas e Baterias"),
        (3, "Papéis e Papelão"),
        (4, "Resíduos Eletrônicos"),
        (5, "Resíduos Orgânicos"),
        (6, "Óleo de Cozinha"),
    ]
    .into_iter()
    .map(|(id, label)| MaterialCategory {
        id: CategoryId(id),
        label: label.to_owned(),
        icon_ref: format!("https://icons.example/{id}.svg"),
    })
    .collect()
}

fn stock() -> Vec<(CollectionPoint, Vec<CategoryId>)> {
    vec![
        (point(1), vec![CategoryId(1), CategoryId(2)]),
        (point(2), vec![CategoryId(3)]),
        (point(3), vec![CategoryId(2), CategoryId(5), CategoryId(6)]),
    ]
}

fn key(categories: &[i64]) -> QueryKey {
    QueryKey::new(
        "MG".into(),
        "Belo Horizonte",
        categories.iter().copied().map(CategoryId),
    )
}

fn coordinator(points: Arc<dyn PointCatalog>) -> DiscoveryCoordinator {
    let coordinator =
        DiscoveryCoordinator::new(StaticRegions::new(), points, CoordinatorConfig::default());
    coordinator.set_catalog(&categories());
    coordinator
}

fn scope(coordinator: &DiscoveryCoordinator) {
    coordinator.set_region("MG".into());
    coordinator.set_municipality("Belo Horizonte");
}

/// Let every runnable task finish. Time is paused, so this only returns once
/// the runtime has nothing left to do before the next timer.
async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn empty_selection_in_belo_horizonte_returns_three_points() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    assert_eq!(coordinator.snapshot().status, QueryStatus::Loading);
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(snapshot.points.len(), 3);
    assert_eq!(snapshot.error, None);
    assert_eq!(catalog.calls(), vec![key(&[])]);
}

#[tokio::test(start_paused = true)]
async fn region_alone_does_not_query_points() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    coordinator.set_region("MG".into());
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Idle);
    assert!(catalog.calls().is_empty());
    let names: Vec<&str> = snapshot
        .municipalities
        .iter()
        .map(|municipality| municipality.name.as_str())
        .collect();
    assert_eq!(names, ["Belo Horizonte", "Contagem"]);
}

#[tokio::test(start_paused = true)]
async fn later_selection_wins_when_the_first_response_arrives_last() {
    let (catalog, mut gates) = GatedPoints::new(2);
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    settle().await;
    assert_eq!(catalog.calls(), vec![key(&[])]);

    coordinator.toggle_category(CategoryId(2));
    coordinator.toggle_category(CategoryId(5));
    settle().await;
    // The intermediate {2} query never left the coordinator.
    assert_eq!(catalog.calls(), vec![key(&[]), key(&[2, 5])]);

    let filtered = gates.pop().expect("second gate");
    let unfiltered = gates.pop().expect("first gate");

    filtered.send(Ok(points(&[1, 3]))).expect("send filtered");
    settle().await;
    unfiltered.send(Ok(points(&[1, 2, 3]))).expect("send unfiltered");
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(snapshot.query, Some(key(&[2, 5])));
    let ids: Vec<PointId> = snapshot.points.iter().map(|point| point.id).collect();
    assert_eq!(ids, [PointId(1), PointId(3)]);
}

#[tokio::test(start_paused = true)]
async fn stale_response_arriving_first_is_discarded() {
    let (catalog, mut gates) = GatedPoints::new(2);
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    settle().await;
    coordinator.toggle_category(CategoryId(2));
    coordinator.toggle_category(CategoryId(5));
    settle().await;

    let filtered = gates.pop().expect("second gate");
    let unfiltered = gates.pop().expect("first gate");

    unfiltered.send(Ok(points(&[1, 2, 3]))).expect("send unfiltered");
    settle().await;
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Loading);
    assert!(snapshot.points.is_empty());

    filtered.send(Ok(points(&[3]))).expect("send filtered");
    settle().await;
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(snapshot.points.len(), 1);
    assert_eq!(snapshot.query, coordinator.current_key());
}

#[tokio::test(start_paused = true)]
async fn committed_key_always_matches_current_state() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    coordinator.toggle_category(CategoryId(1));
    settle().await;
    coordinator.toggle_category(CategoryId(3));
    coordinator.set_municipality("Contagem");
    coordinator.set_municipality("Belo Horizonte");
    coordinator.toggle_category(CategoryId(1));
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(snapshot.query, coordinator.current_key());
    assert_eq!(snapshot.query, Some(key(&[3])));
}

#[tokio::test(start_paused = true)]
async fn toggling_twice_keeps_the_settled_result() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    settle().await;
    let before = coordinator.snapshot();
    assert_eq!(before.status, QueryStatus::Ready);

    coordinator.toggle_category(CategoryId(4));
    coordinator.toggle_category(CategoryId(4));
    assert_eq!(coordinator.snapshot(), before);

    settle().await;
    assert_eq!(coordinator.snapshot(), before);
    assert_eq!(catalog.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn toggling_twice_without_scope_stays_idle() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    coordinator.toggle_category(CategoryId(2));
    coordinator.toggle_category(CategoryId(2));
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Idle);
    assert!(snapshot.selection.is_empty());
    assert!(catalog.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_selection_matches_selecting_every_category() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    settle().await;
    let unfiltered: BTreeSet<PointId> = coordinator
        .snapshot()
        .points
        .iter()
        .map(|point| point.id)
        .collect();

    for category in categories() {
        coordinator.toggle_category(category.id);
    }
    settle().await;
    let snapshot = coordinator.snapshot();
    let everything: BTreeSet<PointId> = snapshot.points.iter().map(|point| point.id).collect();

    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(unfiltered, everything);
    assert_eq!(catalog.calls().first(), Some(&key(&[])));
    assert_eq!(catalog.calls().last(), Some(&key(&[1, 2, 3, 4, 5, 6])));
}

#[tokio::test(start_paused = true)]
async fn zero_matches_is_an_empty_ready_state() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog);

    scope(&coordinator);
    coordinator.toggle_category(CategoryId(4));
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.error, None);
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_with_network_and_retry_fetches_once() {
    let (catalog, mut gates) = GatedPoints::new(2);
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    time::sleep(CoordinatorConfig::default().query_timeout + Duration::from_secs(1)).await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Failed);
    assert_eq!(snapshot.error, Some(ErrorKind::Network));

    // Same key through the setter is not a retry.
    coordinator.set_municipality("Belo Horizonte");
    settle().await;
    assert_eq!(catalog.calls().len(), 1);
    assert_eq!(coordinator.snapshot().status, QueryStatus::Failed);

    let retry_gate = gates.pop().expect("retry gate");
    retry_gate.send(Ok(points(&[1, 2, 3]))).expect("send retry");
    coordinator.retry();
    assert_eq!(coordinator.snapshot().status, QueryStatus::Loading);
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(snapshot.points.len(), 3);
    assert_eq!(catalog.calls(), vec![key(&[]), key(&[])]);
}

#[tokio::test(start_paused = true)]
async fn debounce_window_only_dispatches_the_last_key() {
    let catalog = FilteringPoints::new(stock());
    let config = CoordinatorConfig {
        debounce: Duration::from_millis(150),
        ..CoordinatorConfig::default()
    };
    let coordinator = DiscoveryCoordinator::new(StaticRegions::new(), catalog.clone(), config);
    coordinator.set_catalog(&categories());

    scope(&coordinator);
    coordinator.toggle_category(CategoryId(2));
    time::sleep(Duration::from_millis(100)).await;
    assert!(catalog.calls().is_empty());
    assert_eq!(coordinator.snapshot().status, QueryStatus::Loading);

    coordinator.toggle_category(CategoryId(5));
    time::sleep(Duration::from_millis(100)).await;
    // The {2} window closed at 150 ms, but a newer key had replaced it.
    assert!(catalog.calls().is_empty());
    assert_eq!(coordinator.snapshot().status, QueryStatus::Loading);

    time::sleep(Duration::from_millis(100)).await;
    assert_eq!(catalog.calls(), vec![key(&[2, 5])]);
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Ready);
    assert_eq!(snapshot.query, Some(key(&[2, 5])));
    assert_eq!(snapshot.points.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn municipality_list_timeout_is_a_network_error() {
    let coordinator = DiscoveryCoordinator::new(
        Arc::new(StalledRegions),
        FilteringPoints::new(stock()),
        CoordinatorConfig::default(),
    );

    coordinator.set_region("MG".into());
    settle().await;
    assert_eq!(coordinator.snapshot().municipality_error, None);

    time::sleep(CoordinatorConfig::default().query_timeout).await;
    let snapshot = coordinator.snapshot();
    assert!(snapshot.municipalities.is_empty());
    assert_eq!(snapshot.municipality_error, Some(ErrorKind::Network));
}

#[tokio::test(start_paused = true)]
async fn server_error_is_reported_without_retrying() {
    let (catalog, mut gates) = GatedPoints::new(1);
    let coordinator = coordinator(catalog.clone());

    gates
        .pop()
        .expect("gate")
        .send(Err(PortError::Status(500)))
        .expect("send failure");
    scope(&coordinator);
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Failed);
    assert_eq!(snapshot.error, Some(ErrorKind::Server));
    assert_eq!(catalog.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_without_scope_does_nothing() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    coordinator.retry();
    settle().await;

    assert_eq!(coordinator.snapshot().status, QueryStatus::Idle);
    assert!(catalog.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn changing_region_supersedes_the_pending_query() {
    let (catalog, mut gates) = GatedPoints::new(1);
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    settle().await;
    coordinator.set_region("SP".into());
    gates
        .pop()
        .expect("gate")
        .send(Ok(points(&[1])))
        .expect("send late response");
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, QueryStatus::Idle);
    assert!(snapshot.points.is_empty());
    assert_eq!(snapshot.municipality, None);
    assert_eq!(snapshot.municipalities.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn municipalities_of_a_replaced_region_are_dropped() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog);

    coordinator.set_region("SP".into());
    coordinator.set_region("MG".into());
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.region, Some(RegionCode::from("MG")));
    assert_eq!(snapshot.municipalities.len(), 2);
    assert_eq!(snapshot.municipality_error, None);
}

#[tokio::test(start_paused = true)]
async fn unknown_region_reports_municipality_error() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog);

    coordinator.set_region("XX".into());
    settle().await;

    let snapshot = coordinator.snapshot();
    assert!(snapshot.municipalities.is_empty());
    assert_eq!(snapshot.municipality_error, Some(ErrorKind::Server));
}

#[tokio::test(start_paused = true)]
async fn ids_outside_the_catalog_are_never_queried() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    settle().await;
    coordinator.toggle_category(CategoryId(99));
    settle().await;

    assert!(coordinator.snapshot().is_selected(CategoryId(99)));
    assert_eq!(catalog.calls(), vec![key(&[])]);
}

#[tokio::test(start_paused = true)]
async fn new_catalog_prunes_stale_selection() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog.clone());

    scope(&coordinator);
    coordinator.toggle_category(CategoryId(2));
    coordinator.toggle_category(CategoryId(5));
    settle().await;

    let reduced: Vec<MaterialCategory> = categories()
        .into_iter()
        .filter(|category| category.id != CategoryId(5))
        .collect();
    coordinator.set_catalog(&reduced);
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.selection, vec![CategoryId(2)]);
    assert_eq!(snapshot.query, Some(key(&[2])));
    assert_eq!(catalog.calls().last(), Some(&key(&[2])));
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_loading_then_ready() {
    let catalog = FilteringPoints::new(stock());
    let coordinator = coordinator(catalog);
    let mut updates = coordinator.subscribe();

    scope(&coordinator);
    assert!(updates.has_changed().expect("coordinator alive"));
    assert_eq!(updates.borrow_and_update().status, QueryStatus::Loading);

    let ready = updates
        .wait_for(|snapshot| snapshot.status == QueryStatus::Ready)
        .await
        .expect("coordinator alive");
    assert_eq!(ready.points.len(), 3);
}

fn plugin(
    materials: Result<Vec<MaterialCategory>, u16>,
    points: Arc<dyn PointCatalog>,
) -> BackendPlugin {
    BackendPlugin {
        meta: BackendMeta {
            id: BackendId("memory".to_owned()),
            name: "In-memory".to_owned(),
        },
        regions: StaticRegions::new(),
        materials: Arc::new(StaticMaterials {
            categories: materials,
        }),
        points,
    }
}

#[tokio::test(start_paused = true)]
async fn load_options_installs_the_category_catalog() {
    let catalog = FilteringPoints::new(stock());
    let service = DiscoveryService::new(
        plugin(Ok(categories()), catalog.clone()),
        FixedLocation::new(Err(LocationError::PermissionDenied)),
        CoordinatorConfig::default(),
    );

    let options = service.load_options().await.expect("options");
    assert_eq!(options.regions.len(), 2);
    assert_eq!(options.categories.len(), 6);

    let coordinator = service.coordinator();
    scope(coordinator);
    coordinator.toggle_category(CategoryId(6));
    settle().await;

    assert_eq!(catalog.calls(), vec![key(&[6])]);
    assert_eq!(coordinator.snapshot().points.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn load_options_fails_when_either_source_fails() {
    let service = DiscoveryService::new(
        plugin(Err(503), FilteringPoints::new(stock())),
        FixedLocation::new(Err(LocationError::PermissionDenied)),
        CoordinatorConfig::default(),
    );

    let err = service.load_options().await.expect_err("materials fail");
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test(start_paused = true)]
async fn load_options_times_out_when_a_source_stalls() {
    let service = DiscoveryService::new(
        BackendPlugin {
            regions: Arc::new(StalledRegions),
            ..plugin(Ok(categories()), FilteringPoints::new(stock()))
        },
        FixedLocation::new(Err(LocationError::PermissionDenied)),
        CoordinatorConfig::default(),
    );

    let started = time::Instant::now();
    let err = service.load_options().await.expect_err("regions stall");

    assert!(matches!(err, PortError::Timeout));
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(started.elapsed() >= CoordinatorConfig::default().query_timeout);
}

#[tokio::test(start_paused = true)]
async fn location_denial_never_touches_the_coordinator() {
    let location = FixedLocation::new(Err(LocationError::PermissionDenied));
    let service = DiscoveryService::new(
        plugin(Ok(categories()), FilteringPoints::new(stock())),
        location.clone(),
        CoordinatorConfig::default(),
    );
    let mut updates = service.coordinator().subscribe();
    let before = service.coordinator().snapshot();

    let device = service.locate().await;
    assert_eq!(
        device,
        DeviceCoordinate::Unavailable(UnavailableReason::PermissionDenied)
    );
    assert_eq!(service.initial_viewport().await, Viewport::Unavailable);

    assert!(!updates.has_changed().expect("coordinator alive"));
    assert_eq!(service.coordinator().snapshot(), before);
    assert_eq!(location.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn location_is_resolved_once_per_session() {
    let here = Coordinate::new(-19.92, -43.94);
    let location = FixedLocation::new(Ok(here));
    let service = DiscoveryService::new(
        plugin(Ok(categories()), FilteringPoints::new(stock())),
        location.clone(),
        CoordinatorConfig::default(),
    );

    assert_eq!(service.locate().await, DeviceCoordinate::Available(here));
    assert_eq!(service.locate().await, DeviceCoordinate::Available(here));
    assert!(matches!(
        service.initial_viewport().await,
        Viewport::Centered { center, .. } if center == here
    ));
    assert_eq!(location.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn sensor_failure_leaves_the_map_unlocated() {
    let location = FixedLocation::new(Err(LocationError::Unavailable("gps off".to_owned())));
    let service = DiscoveryService::new(
        plugin(Ok(categories()), FilteringPoints::new(stock())),
        location.clone(),
        CoordinatorConfig::default(),
    );

    assert_eq!(
        service.locate().await,
        DeviceCoordinate::Unavailable(UnavailableReason::SensorError)
    );
    assert_eq!(service.initial_viewport().await, Viewport::Unavailable);
    assert_eq!(location.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_sensor_times_out_once_per_session() {
    let service = DiscoveryService::new(
        plugin(Ok(categories()), FilteringPoints::new(stock())),
        Arc::new(SilentLocation),
        CoordinatorConfig::default(),
    );

    let started = time::Instant::now();
    assert_eq!(
        service.locate().await,
        DeviceCoordinate::Unavailable(UnavailableReason::SensorError)
    );
    assert!(started.elapsed() >= CoordinatorConfig::default().query_timeout);

    let again = time::Instant::now();
    assert_eq!(service.initial_viewport().await, Viewport::Unavailable);
    assert_eq!(again.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn point_detail_is_delegated_to_the_backend() {
    let service = DiscoveryService::new(
        plugin(Ok(categories()), FilteringPoints::new(stock())),
        FixedLocation::new(Err(LocationError::PermissionDenied)),
        CoordinatorConfig::default(),
    );

    let detail = service.point_detail(PointId(3)).await.expect("detail");
    assert_eq!(detail.point.id, PointId(3));
    assert_eq!(detail.items, ["2", "5", "6"]);

    let missing = service.point_detail(PointId(42)).await;
    assert!(matches!(missing, Err(PortError::NotFound)));
}

#[test]
fn registry_resolves_registered_backends_only() {
    let registry = BackendRegistry::new(vec![plugin(
        Ok(categories()),
        FilteringPoints::new(stock()),
    )]);

    assert_eq!(registry.backends().len(), 1);
    assert!(registry.plugin(&BackendId("memory".to_owned())).is_ok());
    assert!(matches!(
        registry.plugin(&BackendId("other".to_owned())),
        Err(PortError::UnknownBackend)
    ));
}
