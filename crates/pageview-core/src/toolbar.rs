//! Live toolbar state for one page session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::QueryDefaults;
use crate::page::{PageConfig, SortDirection};
use crate::record::{FieldPath, RecordId};
use crate::views::ViewType;

/// User-driven query and view state.
///
/// Created on page entry, mutated by interaction, discarded on navigation.
/// Maps and sets are ordered so equal states serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarState {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortState>,
    pub active_view: ViewType,
    #[serde(default)]
    pub page_index: usize,
    pub page_size: usize,
    #[serde(default)]
    pub selected: BTreeSet<RecordId>,
    /// Hidden table columns the user explicitly revealed.
    #[serde(default)]
    pub shown_columns: BTreeSet<String>,
}

impl ToolbarState {
    /// Initial state for a page.
    pub fn for_page(page: &PageConfig, defaults: &QueryDefaults) -> Self {
        let page_size = page
            .toolbar
            .default_page_size
            .or_else(|| {
                page.toolbar
                    .page_size_options
                    .as_ref()
                    .and_then(|o| o.first().copied())
            })
            .unwrap_or(defaults.default_page_size);

        Self {
            search: String::new(),
            filters: BTreeMap::new(),
            sort: None,
            active_view: page.initial_view().unwrap_or(ViewType::Table),
            page_index: 0,
            page_size,
            selected: BTreeSet::new(),
            shown_columns: BTreeSet::new(),
        }
    }

    /// Selected ids in stable order.
    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.selected.iter().cloned().collect()
    }

    /// Toggle one record's selection. Returns the new membership.
    pub fn toggle_selected(&mut self, id: RecordId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }
}

/// Value of one active filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FilterValue {
    /// One value: select, text, number, date, boolean.
    Single(String),
    /// Several values: multiselect.
    Many(Vec<String>),
    /// Inclusive bounds: number, date, dateRange. Either side may be open.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
}

/// User-chosen sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortState {
    pub field: FieldPath,
    pub direction: SortDirection,
}
