//! Toggle-set of the material categories the user filters by.

use std::collections::BTreeSet;

use crate::model::CategoryId;

/// Selected material categories, kept in the order they were first selected.
///
/// Membership is all that matters for querying; the insertion order is kept
/// for presentation only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    ids: Vec<CategoryId>,
}

impl SelectionState {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `id` if present, insert it otherwise. Returns the new selection.
    pub fn toggle(&mut self, id: CategoryId) -> &[CategoryId] {
        if let Some(position) = self.ids.iter().position(|selected| *selected == id) {
            self.ids.remove(position);
        } else {
            self.ids.push(id);
        }
        &self.ids
    }

    /// Deselect everything.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Keep only the ids accepted by `keep`. Returns the ids that were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<CategoryId>
    where
        F: FnMut(CategoryId) -> bool,
    {
        let mut dropped = Vec::new();
        self.ids.retain(|id| {
            let kept = keep(*id);
            if !kept {
                dropped.push(*id);
            }
            kept
        });
        dropped
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn contains(&self, id: CategoryId) -> bool {
        self.ids.contains(&id)
    }

    /// Selected ids in selection order.
    #[must_use]
    pub fn ids(&self) -> &[CategoryId] {
        &self.ids
    }

    /// Selected ids as an unordered set.
    #[must_use]
    pub fn as_set(&self) -> BTreeSet<CategoryId> {
        self.ids.iter().copied().collect()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
