//! Descriptor loading and load-time validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::page::{ActionConfig, PageConfig};
use crate::record::FieldPath;

/// Parse and validate a page descriptor from JSON.
pub fn load_page(json: &str) -> Result<PageConfig, ConfigError> {
    let page: PageConfig =
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_page(&page)?;
    Ok(page)
}

/// Check a descriptor for internal consistency.
///
/// Field paths were already parsed during deserialization; this pass checks
/// cross references between the page's sections.
pub fn validate_page(page: &PageConfig) -> Result<(), ConfigError> {
    let view_types = page.view_types();
    if view_types.is_empty() {
        return Err(ConfigError::NoViewTypes);
    }
    for view_type in &view_types {
        if page.views.get(*view_type).is_none() {
            return Err(ConfigError::MissingViewConfig(*view_type));
        }
    }
    if let Some(default_view) = page.toolbar.default_view {
        if !view_types.contains(&default_view) {
            return Err(ConfigError::DefaultViewNotDeclared(default_view));
        }
    }

    for filter in &page.source.default_filters {
        filter
            .condition()
            .map_err(|reason| ConfigError::InvalidDefaultFilter {
                field: filter.field.to_string(),
                reason,
            })?;
    }

    if let Some(table) = &page.views.table {
        let mut seen = HashSet::new();
        for column in &table.columns {
            if !seen.insert(column.field.as_str()) {
                return Err(ConfigError::DuplicateColumn(column.field.to_string()));
            }
        }
    }

    if let Some(kanban) = &page.views.kanban {
        if kanban.columns.is_empty() {
            return Err(ConfigError::EmptyKanbanColumns);
        }
    }

    if let Some(filters) = &page.toolbar.filters {
        for filter in &filters.fields {
            if filter.filter_type.is_enumerable() && filter.options.is_empty() {
                return Err(ConfigError::MissingFilterOptions(filter.field.to_string()));
            }
        }
    }

    if let Some(options) = &page.toolbar.page_size_options {
        if let Some(zero) = options.iter().find(|&&size| size == 0) {
            return Err(ConfigError::InvalidPageSize(*zero));
        }
    }

    check_unique_actions("row", &page.row_actions)?;
    check_unique_actions("bulk", &page.toolbar.bulk_actions)?;

    if let Some(declared) = &page.source.fields {
        for (location, field) in field_references(page) {
            if !declared.iter().any(|d| field.is_within(d)) {
                return Err(ConfigError::UndeclaredField {
                    location,
                    field: field.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn check_unique_actions(scope: &'static str, actions: &[ActionConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for action in actions {
        if !seen.insert(action.id.as_str()) {
            return Err(ConfigError::DuplicateAction {
                scope,
                id: action.id.clone(),
            });
        }
    }
    Ok(())
}

/// Every record field the page refers to, with a descriptor location.
pub fn field_references(page: &PageConfig) -> Vec<(String, &FieldPath)> {
    let mut refs = Vec::new();

    for view in page.views.configured() {
        let view_type = view.view_type();
        for (slot, field) in view.field_refs() {
            refs.push((format!("views.{view_type}.{slot}"), field));
        }
    }
    for sort in &page.source.default_sorts {
        refs.push(("source.defaultSorts".to_string(), &sort.field));
    }
    for filter in &page.source.default_filters {
        refs.push(("source.defaultFilters".to_string(), &filter.field));
    }
    if let Some(search) = &page.toolbar.search {
        for field in &search.fields {
            refs.push(("toolbar.search.fields".to_string(), field));
        }
    }
    if let Some(filters) = &page.toolbar.filters {
        for filter in &filters.fields {
            refs.push(("toolbar.filters".to_string(), &filter.field));
        }
    }
    if let Some(sort) = &page.toolbar.sort {
        for option in &sort.fields {
            refs.push(("toolbar.sort.fields".to_string(), &option.field));
        }
    }
    if let Some(stats) = &page.stats {
        for item in &stats.items {
            if let Some(field) = &item.aggregate_field {
                refs.push((format!("stats.{}.aggregateField", item.id), field));
            }
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::ViewType;
    use serde_json::{json, Value};

    fn page_json(overrides: Value) -> String {
        let mut page = json!({
            "id": "leads",
            "title": "Leads",
            "source": {"entity": "lead"},
            "toolbar": {"viewTypes": ["table", "kanban"]},
            "views": {
                "table": {"columns": [
                    {"field": "name", "label": "Name", "sortable": true},
                    {"field": "stage", "label": "Stage"}
                ]},
                "kanban": {
                    "statusField": "stage",
                    "titleField": "name",
                    "columns": [{"id": "lead", "label": "Lead"}]
                }
            }
        });
        merge(&mut page, overrides);
        page.to_string()
    }

    fn merge(target: &mut Value, patch: Value) {
        match (target, patch) {
            (Value::Object(t), Value::Object(p)) => {
                for (k, v) in p {
                    merge(t.entry(k).or_insert(Value::Null), v);
                }
            }
            (t, p) => *t = p,
        }
    }

    #[test]
    fn test_valid_page_loads() {
        let page = load_page(&page_json(json!({}))).unwrap();
        assert_eq!(page.view_types(), vec![ViewType::Table, ViewType::Kanban]);
    }

    #[test]
    fn test_malformed_field_path_fails_at_load() {
        let err = load_page(&page_json(json!({
            "views": {"kanban": {"statusField": "stage..name"}}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_view_config() {
        let err = load_page(&page_json(json!({
            "toolbar": {"viewTypes": ["table", "map"]}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingViewConfig(ViewType::Map)));
    }

    #[test]
    fn test_default_view_must_be_declared() {
        let err = load_page(&page_json(json!({
            "toolbar": {"viewTypes": ["table"], "defaultView": "kanban"}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::DefaultViewNotDeclared(ViewType::Kanban)));
    }

    #[test]
    fn test_undeclared_field_against_source_fields() {
        let err = load_page(&page_json(json!({
            "source": {"entity": "lead", "fields": ["name"]}
        })))
        .unwrap_err();
        match err {
            ConfigError::UndeclaredField { location, field } => {
                assert_eq!(location, "views.table.column");
                assert_eq!(field, "stage");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_dotted_field_within_declared_root() {
        let page = load_page(&page_json(json!({
            "source": {"entity": "lead", "fields": ["name", "stage", "owner"]},
            "views": {"kanban": {"cardFields": ["owner.name"]}}
        })));
        assert!(page.is_ok());
    }

    #[test]
    fn test_duplicate_bulk_action() {
        let err = load_page(&page_json(json!({
            "toolbar": {"bulkActions": [
                {"id": "delete", "label": "Delete"},
                {"id": "delete", "label": "Delete again"}
            ]}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAction { scope: "bulk", .. }));
    }

    #[test]
    fn test_select_filter_requires_options() {
        let err = load_page(&page_json(json!({
            "toolbar": {"filters": {"fields": [
                {"field": "stage", "label": "Stage", "type": "select"}
            ]}}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFilterOptions(_)));
    }

    #[test]
    fn test_default_filter_operator_shape() {
        let err = load_page(&page_json(json!({
            "source": {"entity": "lead", "defaultFilters": [
                {"field": "amount", "operator": "between", "value": [1]}
            ]}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefaultFilter { .. }));

        let page = load_page(&page_json(json!({
            "source": {"entity": "lead", "defaultFilters": [
                {"field": "createdAt", "operator": "gte", "value": "2024-01-01"},
                {"field": "stage", "operator": "in", "value": ["lead", "won"]}
            ]}
        })));
        assert!(page.is_ok());
    }

    #[test]
    fn test_zero_page_size_option() {
        let err = load_page(&page_json(json!({
            "toolbar": {"pageSizeOptions": [0, 10]}
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPageSize(0)));
    }
}
