//! Query Resolver.
//!
//! Turns a page descriptor plus the live toolbar state into the canonical
//! [`QueryDescriptor`]. Resolution is a pure function: the same inputs
//! always yield an equal descriptor, and nothing outside the arguments is
//! read.

use std::collections::BTreeSet;

use serde_json::Value;

use pageview_core::value::parse_datetime;
use pageview_core::{
    Condition, FieldPath, FilterFieldConfig, FilterType, FilterValue, PageConfig, Predicate,
    QueryDefaults, QueryDescriptor, SearchPredicate, SortKey, ToolbarError, ToolbarState,
    ViewConfig, ViewType,
};

/// Resolve page config and toolbar state into a query descriptor.
///
/// Default filters come first, then user filters in field order. The user
/// sort replaces the default sorts entirely.
pub fn resolve(
    page: &PageConfig,
    toolbar: &ToolbarState,
    defaults: &QueryDefaults,
) -> Result<QueryDescriptor, ToolbarError> {
    let view = active_view(page, toolbar.active_view)?;

    // Default filters were checked at load; a failure here means the page
    // was built without `load_page`.
    let mut predicates: Vec<Predicate> = page
        .source
        .default_filters
        .iter()
        .filter_map(|f| match f.condition() {
            Ok(condition) => Some(Predicate::new(f.field.clone(), condition)),
            Err(reason) => {
                tracing::warn!(field = %f.field, reason, "skipping invalid default filter");
                None
            }
        })
        .collect();

    for (field, value) in &toolbar.filters {
        let config = page
            .filter_field(field)
            .ok_or_else(|| ToolbarError::UnknownFilter(field.clone()))?;
        if let Some(condition) = filter_condition(config, value)? {
            predicates.push(Predicate::new(config.field.clone(), condition));
        }
    }

    let search = search_predicate(page, &toolbar.search)?;

    let sort = match &toolbar.sort {
        Some(user) => {
            if !is_sortable(page, &user.field) {
                return Err(ToolbarError::NotSortable(user.field.to_string()));
            }
            vec![SortKey {
                field: user.field.clone(),
                direction: user.direction,
            }]
        }
        None => page
            .source
            .default_sorts
            .iter()
            .map(|s| SortKey {
                field: s.field.clone(),
                direction: s.direction,
            })
            .collect(),
    };

    let page_size = effective_page_size(toolbar.page_size, page, defaults);

    Ok(QueryDescriptor {
        entity: page.source.entity.clone(),
        search,
        predicates,
        sort,
        offset: toolbar.page_index.saturating_mul(page_size),
        limit: Some(page_size),
        fields: required_fields(page, view),
    })
}

/// The configuration of `view_type`, if the page offers it.
pub fn active_view(page: &PageConfig, view_type: ViewType) -> Result<ViewConfig<'_>, ToolbarError> {
    if !page.view_types().contains(&view_type) {
        return Err(ToolbarError::ViewNotAvailable(view_type));
    }
    page.views
        .get(view_type)
        .ok_or(ToolbarError::ViewNotAvailable(view_type))
}

/// Fields a view reads. Always includes `id`.
pub fn required_fields(page: &PageConfig, view: ViewConfig<'_>) -> BTreeSet<FieldPath> {
    let mut fields: BTreeSet<FieldPath> =
        view.field_refs().into_iter().map(|(_, f)| f.clone()).collect();
    let siblings = format_fields(page, fields.iter());
    fields.extend(siblings);
    if let Ok(id) = FieldPath::parse("id") {
        fields.insert(id);
    }
    fields
}

/// Sibling fields (link href, avatar image) read by the table formats of
/// `fields`. Card views reuse those formats, so they read the siblings too.
pub fn format_fields<'a, I>(page: &PageConfig, fields: I) -> Vec<FieldPath>
where
    I: IntoIterator<Item = &'a FieldPath>,
{
    let Some(table) = page.views.table.as_ref() else {
        return Vec::new();
    };
    fields
        .into_iter()
        .filter_map(|f| table.column(f.as_str()))
        .filter_map(|c| c.format.as_ref())
        .flat_map(|format| format.auxiliary_fields())
        .cloned()
        .collect()
}

/// Clamp a requested page size.
///
/// With `pageSizeOptions` the largest option not above the request wins,
/// falling back to the smallest option. Otherwise the size is clamped to
/// `[1, max_page_size]` and zero means the configured default.
pub fn effective_page_size(requested: usize, page: &PageConfig, defaults: &QueryDefaults) -> usize {
    let max = defaults.max_page_size.max(1);
    match page.toolbar.page_size_options.as_deref() {
        Some(options) if !options.is_empty() => options
            .iter()
            .copied()
            .filter(|&o| o <= requested)
            .max()
            .or_else(|| options.iter().copied().min())
            .unwrap_or(defaults.default_page_size),
        _ if requested == 0 => defaults.default_page_size.clamp(1, max),
        _ => requested.clamp(1, max),
    }
}

/// True if the user may sort by `field`.
pub fn is_sortable(page: &PageConfig, field: &FieldPath) -> bool {
    let in_options = page
        .toolbar
        .sort
        .as_ref()
        .is_some_and(|s| s.fields.iter().any(|o| &o.field == field));
    let sortable_column = page
        .views
        .table
        .as_ref()
        .and_then(|t| t.column(field.as_str()))
        .is_some_and(|c| c.sortable);
    in_options || sortable_column
}

fn search_predicate(
    page: &PageConfig,
    text: &str,
) -> Result<Option<SearchPredicate>, ToolbarError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match &page.toolbar.search {
        Some(config) if config.enabled => Ok(Some(SearchPredicate {
            text: text.to_string(),
            fields: config.fields.clone(),
        })),
        _ => Err(ToolbarError::SearchDisabled),
    }
}

/// Condition for one active filter. `None` means the filter is inert, such
/// as an empty text box or an empty multiselect.
pub fn filter_condition(
    config: &FilterFieldConfig,
    value: &FilterValue,
) -> Result<Option<Condition>, ToolbarError> {
    let field = config.field.as_str();
    let mismatch = |expected: &'static str| ToolbarError::FilterShapeMismatch {
        field: field.to_string(),
        expected,
    };
    let check_option = |v: &str| {
        if config.has_option(v) {
            Ok(())
        } else {
            Err(ToolbarError::InvalidFilterValue {
                field: field.to_string(),
                value: v.to_string(),
            })
        }
    };

    let condition = match (config.filter_type, value) {
        (FilterType::Select, FilterValue::Single(v)) => {
            check_option(v)?;
            Condition::Equals {
                value: Value::String(v.clone()),
            }
        }
        (FilterType::Select, _) => return Err(mismatch("a single option")),

        (FilterType::Multiselect, FilterValue::Many(values)) => {
            if values.is_empty() {
                return Ok(None);
            }
            for v in values {
                check_option(v)?;
            }
            Condition::OneOf {
                values: values.iter().cloned().map(Value::String).collect(),
            }
        }
        (FilterType::Multiselect, FilterValue::Single(v)) => {
            check_option(v)?;
            Condition::OneOf {
                values: vec![Value::String(v.clone())],
            }
        }
        (FilterType::Multiselect, FilterValue::Range { .. }) => {
            return Err(mismatch("a list of options"))
        }

        (FilterType::Text, FilterValue::Single(v)) => {
            let text = v.trim();
            if text.is_empty() {
                return Ok(None);
            }
            Condition::Contains {
                text: text.to_string(),
            }
        }
        (FilterType::Text, _) => return Err(mismatch("text")),

        (FilterType::Number, FilterValue::Single(v)) => {
            let n = parse_number(v).ok_or_else(|| mismatch("a number"))?;
            Condition::NumberRange {
                min: Some(n),
                max: Some(n),
            }
        }
        (FilterType::Number, FilterValue::Range { from, to }) => {
            let min = parse_bound(from.as_deref(), parse_number).map_err(|_| mismatch("a number range"))?;
            let max = parse_bound(to.as_deref(), parse_number).map_err(|_| mismatch("a number range"))?;
            if min.is_none() && max.is_none() {
                return Ok(None);
            }
            Condition::NumberRange { min, max }
        }
        (FilterType::Number, FilterValue::Many(_)) => return Err(mismatch("a number")),

        (FilterType::Date | FilterType::DateRange, FilterValue::Single(v)) => {
            let date = parse_date(v).ok_or_else(|| mismatch("an ISO date"))?;
            Condition::DateRange {
                from: Some(date),
                to: Some(date),
            }
        }
        (FilterType::Date | FilterType::DateRange, FilterValue::Range { from, to }) => {
            let from = parse_bound(from.as_deref(), parse_date).map_err(|_| mismatch("an ISO date range"))?;
            let to = parse_bound(to.as_deref(), parse_date).map_err(|_| mismatch("an ISO date range"))?;
            if from.is_none() && to.is_none() {
                return Ok(None);
            }
            Condition::DateRange { from, to }
        }
        (FilterType::Date | FilterType::DateRange, FilterValue::Many(_)) => {
            return Err(mismatch("an ISO date range"))
        }

        (FilterType::Boolean, FilterValue::Single(v)) => match v.trim() {
            "true" | "false" => Condition::Equals {
                value: Value::String(v.trim().to_string()),
            },
            _ => return Err(mismatch("true or false")),
        },
        (FilterType::Boolean, _) => return Err(mismatch("true or false")),
    };

    Ok(Some(condition))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date(raw: &str) -> Option<chrono::NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}

/// Parse an optional bound. Blank means open.
fn parse_bound<T>(raw: Option<&str>, parse: fn(&str) -> Option<T>) -> Result<Option<T>, ()> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse(v).map(Some).ok_or(()),
    }
}
