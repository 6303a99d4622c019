//! Keeps the collection-point query in step with the user's region, municipality
//! and material choices.
//!
//! Every setter applies its change synchronously, derives the [`QueryKey`] and
//! compares it with the last issued one. A differing key moves the coordinator
//! to [`QueryStatus::Loading`] and spawns a fetch. A response is committed only
//! when it belongs to the latest generation and its key still matches the
//! current state; anything else is dropped on arrival.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::model::{
    CategoryId, CollectionPoint, MaterialCategory, Municipality, QueryKey, RegionCode,
};
use crate::ports::{ErrorKind, PointCatalog, RegionCatalog};
use crate::selection::SelectionState;

/// Default bound on a single catalog fetch.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Lifecycle of the point query.
pub enum QueryStatus {
    /// No valid scope has been chosen yet.
    #[default]
    Idle,
    /// A query for the current key is pending.
    Loading,
    /// The current key's points are available.
    Ready,
    /// The current key's query failed; see [`DiscoverySnapshot::error`].
    Failed,
}

#[derive(Debug, Clone, Copy)]
/// Tuning knobs for the coordinator.
pub struct CoordinatorConfig {
    /// Upper bound on each point or municipality fetch.
    pub query_timeout: Duration,
    /// Quiet period before a point query is sent.
    pub debounce: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            debounce: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Immutable view of the coordinator state handed to presentation.
pub struct DiscoverySnapshot {
    /// Point query status.
    pub status: QueryStatus,
    /// Points of the last committed query.
    pub points: Arc<[CollectionPoint]>,
    /// Failure classification, set only while [`QueryStatus::Failed`].
    pub error: Option<ErrorKind>,
    /// Key of the last committed result.
    pub query: Option<QueryKey>,
    /// Selected region.
    pub region: Option<RegionCode>,
    /// Selected municipality.
    pub municipality: Option<String>,
    /// Selected categories in selection order.
    pub selection: Vec<CategoryId>,
    /// Municipalities of the selected region.
    pub municipalities: Arc<[Municipality]>,
    /// Why the municipality list could not be loaded.
    pub municipality_error: Option<ErrorKind>,
}

impl DiscoverySnapshot {
    /// A successful query that matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status == QueryStatus::Ready && self.points.is_empty()
    }

    /// Whether `id` is part of the selection.
    #[must_use]
    pub fn is_selected(&self, id: CategoryId) -> bool {
        self.selection.contains(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingQuery {
    generation: u64,
    key: QueryKey,
}

#[derive(Debug)]
struct Settled {
    key: QueryKey,
    error: Option<ErrorKind>,
}

#[derive(Debug, Default)]
struct State {
    region: Option<RegionCode>,
    municipality: Option<String>,
    selection: SelectionState,
    catalog: Option<HashSet<CategoryId>>,

    status: QueryStatus,
    points: Arc<[CollectionPoint]>,
    settled: Option<Settled>,
    issued: Option<QueryKey>,
    generation: u64,

    municipalities: Arc<[Municipality]>,
    municipality_error: Option<ErrorKind>,
    municipality_generation: u64,
}

impl State {
    fn is_known(&self, id: CategoryId) -> bool {
        self.catalog
            .as_ref()
            .is_some_and(|catalog| catalog.contains(&id))
    }

    /// Key derived from the current choices; `None` until a municipality is set.
    /// Categories missing from the current catalog never reach the key.
    fn current_key(&self) -> Option<QueryKey> {
        let region = self.region.clone()?;
        let municipality = self.municipality.clone()?;
        let categories = self
            .selection
            .ids()
            .iter()
            .copied()
            .filter(|id| self.is_known(*id));
        Some(QueryKey::new(region, municipality, categories))
    }

    fn evaluate(&mut self) -> Option<PendingQuery> {
        let Some(key) = self.current_key() else {
            if self.issued.is_some() || self.status != QueryStatus::Idle {
                self.generation += 1;
                self.reset_query();
            }
            return None;
        };

        if self.issued.as_ref() == Some(&key) {
            return None;
        }

        self.generation += 1;
        self.issued = Some(key.clone());

        if let Some(settled) = &self.settled
            && settled.key == key
            && settled.error.is_none()
        {
            // The committed points already answer this key.
            self.status = QueryStatus::Ready;
            return None;
        }

        self.status = QueryStatus::Loading;
        Some(PendingQuery {
            generation: self.generation,
            key,
        })
    }

    fn reissue(&mut self) -> Option<PendingQuery> {
        let key = self.current_key()?;
        self.generation += 1;
        self.issued = Some(key.clone());
        self.status = QueryStatus::Loading;
        Some(PendingQuery {
            generation: self.generation,
            key,
        })
    }

    fn reset_query(&mut self) {
        self.issued = None;
        self.settled = None;
        self.status = QueryStatus::Idle;
        self.points = Arc::default();
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn commit(
        &mut self,
        generation: u64,
        key: &QueryKey,
        outcome: Result<Vec<CollectionPoint>, ErrorKind>,
    ) -> bool {
        if !self.is_latest(generation) || self.current_key().as_ref() != Some(key) {
            return false;
        }

        match outcome {
            Ok(points) => {
                self.status = QueryStatus::Ready;
                self.points = Arc::from(points);
                self.settled = Some(Settled {
                    key: key.clone(),
                    error: None,
                });
            }
            Err(kind) => {
                self.status = QueryStatus::Failed;
                self.points = Arc::default();
                self.settled = Some(Settled {
                    key: key.clone(),
                    error: Some(kind),
                });
            }
        }
        true
    }

    fn snapshot(&self) -> DiscoverySnapshot {
        let error = match (&self.status, &self.settled) {
            (QueryStatus::Failed, Some(settled)) => settled.error,
            _ => None,
        };
        DiscoverySnapshot {
            status: self.status,
            points: Arc::clone(&self.points),
            error,
            query: self.settled.as_ref().map(|settled| settled.key.clone()),
            region: self.region.clone(),
            municipality: self.municipality.clone(),
            selection: self.selection.ids().to_vec(),
            municipalities: Arc::clone(&self.municipalities),
            municipality_error: self.municipality_error,
        }
    }
}

struct Shared {
    regions: Arc<dyn RegionCatalog>,
    points: Arc<dyn PointCatalog>,
    config: CoordinatorConfig,
    state: Mutex<State>,
    snapshots: watch::Sender<DiscoverySnapshot>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the state and notify subscribers if the snapshot changed.
    fn apply<R>(&self, mutate: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.lock_state();
        let result = mutate(&mut state);
        let next = state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        result
    }

    async fn run_query(self: Arc<Self>, pending: PendingQuery) {
        let PendingQuery { generation, key } = pending;

        if !self.config.debounce.is_zero() {
            time::sleep(self.config.debounce).await;
        }
        let latest = self.lock_state().is_latest(generation);
        if !latest {
            tracing::debug!(generation, "point query superseded before dispatch");
            return;
        }

        tracing::info!(
            generation,
            region = %key.region,
            municipality = %key.municipality,
            categories = %key.categories_param(),
            "issuing point query"
        );

        let outcome = match time::timeout(self.config.query_timeout, self.points.points(&key)).await
        {
            Ok(Ok(points)) => Ok(points),
            Ok(Err(err)) => {
                tracing::warn!(generation, error = %err, "point query failed");
                Err(err.kind())
            }
            Err(_elapsed) => {
                tracing::warn!(
                    generation,
                    timeout = ?self.config.query_timeout,
                    "point query timed out"
                );
                Err(ErrorKind::Network)
            }
        };

        let count = outcome.as_ref().map_or(0, Vec::len);
        let committed = self.apply(|state| state.commit(generation, &key, outcome));
        if committed {
            tracing::info!(generation, points = count, "point query committed");
        } else {
            tracing::debug!(generation, "discarding stale point response");
        }
    }

    async fn load_municipalities(self: Arc<Self>, generation: u64, region: RegionCode) {
        let outcome = match time::timeout(
            self.config.query_timeout,
            self.regions.municipalities(&region),
        )
        .await
        {
            Ok(Ok(municipalities)) => Ok(municipalities),
            Ok(Err(err)) => {
                tracing::warn!(%region, error = %err, "municipality list failed");
                Err(err.kind())
            }
            Err(_elapsed) => {
                tracing::warn!(%region, "municipality list timed out");
                Err(ErrorKind::Network)
            }
        };

        self.apply(|state| {
            if state.municipality_generation != generation {
                tracing::debug!(%region, "discarding municipalities of a previous region");
                return;
            }
            match outcome {
                Ok(municipalities) => {
                    tracing::info!(%region, count = municipalities.len(), "municipalities loaded");
                    state.municipalities = Arc::from(municipalities);
                    state.municipality_error = None;
                }
                Err(kind) => {
                    state.municipalities = Arc::default();
                    state.municipality_error = Some(kind);
                }
            }
        });
    }
}

/// Owner of the discovery session state.
///
/// Cloning yields another handle to the same coordinator. Setters must be
/// called from within a Tokio runtime, since they spawn the fetches they
/// trigger.
#[derive(Clone)]
pub struct DiscoveryCoordinator {
    shared: Arc<Shared>,
}

impl DiscoveryCoordinator {
    /// Create an idle coordinator over the given catalogs.
    #[must_use]
    pub fn new(
        regions: Arc<dyn RegionCatalog>,
        points: Arc<dyn PointCatalog>,
        config: CoordinatorConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(DiscoverySnapshot::default());
        Self {
            shared: Arc::new(Shared {
                regions,
                points,
                config,
                state: Mutex::new(State::default()),
                snapshots,
            }),
        }
    }

    /// Current state. Has no side effects.
    #[must_use]
    pub fn snapshot(&self) -> DiscoverySnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Receive every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DiscoverySnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Key the current choices map to, if they form a valid scope.
    #[must_use]
    pub fn current_key(&self) -> Option<QueryKey> {
        self.shared.lock_state().current_key()
    }

    /// Install a freshly fetched material catalog.
    ///
    /// Selected ids missing from it are deselected.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and a query must be issued.
    pub fn set_catalog(&self, categories: &[MaterialCategory]) {
        let pending = self.shared.apply(|state| {
            let known: HashSet<CategoryId> =
                categories.iter().map(|category| category.id).collect();
            let dropped = state.selection.retain(|id| known.contains(&id));
            if !dropped.is_empty() {
                tracing::warn!(?dropped, "deselecting categories missing from the new catalog");
            }
            state.catalog = Some(known);
            state.evaluate()
        });
        self.dispatch(pending);
    }

    /// Select a region. Clears the municipality and reloads the municipality list.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn set_region(&self, region: RegionCode) {
        let generation = self.shared.apply(|state| {
            state.region = Some(region.clone());
            state.municipality = None;
            state.municipalities = Arc::default();
            state.municipality_error = None;
            state.municipality_generation += 1;
            // A region alone is not a query scope; this only supersedes.
            let pending = state.evaluate();
            debug_assert!(pending.is_none(), "region change must not issue a query");
            state.municipality_generation
        });

        let shared = Arc::clone(&self.shared);
        tokio::spawn(shared.load_municipalities(generation, region));
    }

    /// Select a municipality of the current region.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and a query must be issued.
    pub fn set_municipality<S: Into<String>>(&self, name: S) {
        let name = name.into();
        let pending = self.shared.apply(|state| {
            state.municipality = Some(name);
            state.evaluate()
        });
        self.dispatch(pending);
    }

    /// Flip one category in or out of the filter.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and a query must be issued.
    pub fn toggle_category(&self, id: CategoryId) {
        let pending = self.shared.apply(|state| {
            state.selection.toggle(id);
            if !state.is_known(id) {
                tracing::warn!(%id, "category is not in the current catalog; ignored for querying");
            }
            state.evaluate()
        });
        self.dispatch(pending);
    }

    /// Drop every category from the filter.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and a query must be issued.
    pub fn clear_selection(&self) {
        let pending = self.shared.apply(|state| {
            state.selection.clear();
            state.evaluate()
        });
        self.dispatch(pending);
    }

    /// Re-issue the current key even if it did not change.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and a query must be issued.
    pub fn retry(&self) {
        let pending = self.shared.apply(State::reissue);
        if pending.is_none() {
            tracing::debug!("retry ignored: no region and municipality selected");
        }
        self.dispatch(pending);
    }

    fn dispatch(&self, pending: Option<PendingQuery>) {
        if let Some(pending) = pending {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(shared.run_query(pending));
        }
    }
}
