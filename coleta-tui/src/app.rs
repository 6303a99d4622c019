use std::sync::Arc;

use coleta_core::{
    coordinator::DiscoverySnapshot,
    model::{CollectionPoint, MaterialCategory, PointDetail, Region, Viewport},
    service::{CatalogOptions, DiscoveryService},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    RegionSelect,
    MunicipalitySelect,
    Points,
    PointDetail,
}

/// Which pane of the points screen receives movement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Categories,
    Points,
}

pub(crate) struct App {
    pub service: Arc<DiscoveryService>,

    pub screen: Screen,
    pub focus: Focus,

    pub options: CatalogOptions,
    pub region_list_index: usize,
    pub municipality_list_index: usize,
    pub category_list_index: usize,
    pub point_list_index: usize,

    /// Latest coordinator state, refreshed before every draw.
    pub snapshot: DiscoverySnapshot,
    pub viewport: Viewport,
    pub detail: Option<PointDetail>,

    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<DiscoveryService>) -> Self {
        let snapshot = service.coordinator().snapshot();
        Self {
            service,
            screen: Screen::RegionSelect,
            focus: Focus::Categories,
            options: CatalogOptions::default(),
            region_list_index: 0,
            municipality_list_index: 0,
            category_list_index: 0,
            point_list_index: 0,
            snapshot,
            viewport: Viewport::Unavailable,
            detail: None,
            is_loading: false,
            error_message: None,
        }
    }

    /// Take a new coordinator snapshot and keep the cursors inside the lists.
    pub(crate) fn refresh(&mut self, snapshot: DiscoverySnapshot) {
        self.snapshot = snapshot;
        self.municipality_list_index =
            clamp_index(self.municipality_list_index, self.snapshot.municipalities.len());
        self.point_list_index = clamp_index(self.point_list_index, self.snapshot.points.len());
    }

    pub(crate) fn current_region(&self) -> Option<&Region> {
        self.options.regions.get(self.region_list_index)
    }

    pub(crate) fn current_category(&self) -> Option<&MaterialCategory> {
        self.options.categories.get(self.category_list_index)
    }

    pub(crate) fn current_point(&self) -> Option<&CollectionPoint> {
        self.snapshot.points.get(self.point_list_index)
    }

    pub(crate) fn select_current_region(&mut self) {
        let Some(region) = self.current_region() else {
            return;
        };
        let code = region.code.clone();
        self.service.coordinator().set_region(code);
        self.municipality_list_index = 0;
        self.screen = Screen::MunicipalitySelect;
    }

    pub(crate) fn select_current_municipality(&mut self) {
        let Some(municipality) = self
            .snapshot
            .municipalities
            .get(self.municipality_list_index)
        else {
            return;
        };
        let name = municipality.name.clone();
        self.service.coordinator().set_municipality(name);
        self.point_list_index = 0;
        self.screen = Screen::Points;
    }

    pub(crate) fn toggle_current_category(&mut self) {
        if let Some(category) = self.current_category() {
            let id = category.id;
            self.service.coordinator().toggle_category(id);
        }
    }

    pub(crate) fn back(&mut self) {
        self.error_message = None;
        self.screen = match self.screen {
            Screen::RegionSelect | Screen::MunicipalitySelect => Screen::RegionSelect,
            Screen::Points => Screen::MunicipalitySelect,
            Screen::PointDetail => {
                self.detail = None;
                Screen::Points
            }
        };
    }
}

pub(crate) fn move_up(index: &mut usize) {
    *index = index.saturating_sub(1);
}

pub(crate) fn move_down(index: &mut usize, len: usize) {
    if *index + 1 < len {
        *index += 1;
    }
}

fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}
