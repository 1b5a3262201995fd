//! Page descriptor schema.
//!
//! These types mirror the camelCase descriptor contract field for field.
//! Hundreds of descriptors depend on these names verbatim, so renames here
//! are breaking changes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::permission::PermissionKind;
use crate::query::{Comparison, Condition};
use crate::record::FieldPath;
use crate::value::{value_date, value_number, value_text};
use crate::views::{ViewType, ViewsConfig};

// =============================================================================
// PageConfig
// =============================================================================

/// Declarative descriptor of one data-management page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: SourceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsConfig>,
    #[serde(default)]
    pub toolbar: ToolbarConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<ActionConfig>,
    #[serde(default)]
    pub row_actions: Vec<ActionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionsConfig>,
}

impl PageConfig {
    /// View types the user may switch between.
    ///
    /// Falls back to every configured view when the toolbar lists none.
    pub fn view_types(&self) -> Vec<ViewType> {
        if self.toolbar.view_types.is_empty() {
            self.views.configured().map(|v| v.view_type()).collect()
        } else {
            self.toolbar.view_types.clone()
        }
    }

    /// View shown on page entry.
    pub fn initial_view(&self) -> Option<ViewType> {
        self.toolbar
            .default_view
            .or_else(|| self.view_types().first().copied())
    }

    /// Row action by id.
    pub fn row_action(&self, id: &str) -> Option<&ActionConfig> {
        self.row_actions.iter().find(|a| a.id == id)
    }

    /// Bulk action by id.
    pub fn bulk_action(&self, id: &str) -> Option<&ActionConfig> {
        self.toolbar.bulk_actions.iter().find(|a| a.id == id)
    }

    /// Toolbar filter declaration for a field.
    pub fn filter_field(&self, field: &str) -> Option<&FilterFieldConfig> {
        self.toolbar
            .filters
            .as_ref()
            .and_then(|f| f.fields.iter().find(|c| c.field.as_str() == field))
    }
}

// =============================================================================
// Source
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub entity: String,
    #[serde(default)]
    pub default_filters: Vec<DefaultFilter>,
    #[serde(default)]
    pub default_sorts: Vec<SortConfig>,
    /// Declared record schema. When present, every field reference on the
    /// page must fall inside it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldPath>>,
}

/// A filter the page always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultFilter {
    pub field: FieldPath,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl DefaultFilter {
    /// The query condition this filter applies.
    ///
    /// Comparison operators accept numbers or ISO dates; `between` takes a
    /// two-element array whose `null` side is open.
    pub fn condition(&self) -> Result<Condition, &'static str> {
        let value = &self.value;
        let condition = match self.operator {
            FilterOperator::Eq => Condition::Equals {
                value: value.clone(),
            },
            FilterOperator::Neq => Condition::NotEquals {
                value: value.clone(),
            },
            FilterOperator::In => match value {
                Value::Array(values) => Condition::OneOf {
                    values: values.clone(),
                },
                _ => return Err("`in` expects an array"),
            },
            FilterOperator::Contains => Condition::Contains {
                text: value_text(value).ok_or("`contains` expects a value")?,
            },
            FilterOperator::Gt => compare(Comparison::Gt, value)?,
            FilterOperator::Gte => compare(Comparison::Gte, value)?,
            FilterOperator::Lt => compare(Comparison::Lt, value)?,
            FilterOperator::Lte => compare(Comparison::Lte, value)?,
            FilterOperator::Between => match value.as_array().map(Vec::as_slice) {
                Some([low, high]) => between(low, high)?,
                _ => return Err("`between` expects a two-element array"),
            },
            FilterOperator::IsNull => Condition::IsNull,
            FilterOperator::IsNotNull => Condition::IsNotNull,
        };
        Ok(condition)
    }
}

fn compare(comparison: Comparison, value: &Value) -> Result<Condition, &'static str> {
    if let Some(n) = value_number(value) {
        return Ok(Condition::Compare {
            comparison,
            value: n,
        });
    }
    let date = value_date(value).ok_or("comparison expects a number or an ISO date")?;
    Ok(match comparison {
        Comparison::Gt => Condition::DateRange {
            from: date.succ_opt(),
            to: None,
        },
        Comparison::Gte => Condition::DateRange {
            from: Some(date),
            to: None,
        },
        Comparison::Lt => Condition::DateRange {
            from: None,
            to: date.pred_opt(),
        },
        Comparison::Lte => Condition::DateRange {
            from: None,
            to: Some(date),
        },
    })
}

fn between(low: &Value, high: &Value) -> Result<Condition, &'static str> {
    if low.is_null() && high.is_null() {
        return Err("`between` needs at least one bound");
    }
    let numeric = |v: &Value| v.is_null() || value_number(v).is_some();
    if numeric(low) && numeric(high) {
        return Ok(Condition::NumberRange {
            min: value_number(low),
            max: value_number(high),
        });
    }
    let dated = |v: &Value| v.is_null() || value_date(v).is_some();
    if dated(low) && dated(high) {
        return Ok(Condition::DateRange {
            from: value_date(low),
            to: value_date(high),
        });
    }
    Err("`between` bounds must both be numbers or ISO dates")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    Neq,
    In,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortConfig {
    pub field: FieldPath,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsConfig {
    #[serde(default)]
    pub items: Vec<StatItemConfig>,
}

/// One stat tile.
///
/// Value precedence: aggregate payload `field`, then literal `value`, then
/// a reduction over the current records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatItemConfig {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<StatAggregate>,
    /// Record field reduced by `aggregate`. Defaults to `field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_field: Option<FieldPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<StatFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatAggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatFormat {
    #[default]
    Number,
    Currency,
    Percentage,
}

/// Trend against a reference value in the aggregate payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendConfig {
    pub field: String,
    /// Treat a decrease as the favourable direction.
    #[serde(default)]
    pub invert: bool,
}

// =============================================================================
// Toolbar
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FiltersConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOptionsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportConfig>,
    #[serde(default)]
    pub bulk_actions: Vec<ActionConfig>,
    #[serde(default)]
    pub view_types: Vec<ViewType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_view: Option<ViewType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size_options: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldPath>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersConfig {
    #[serde(default)]
    pub fields: Vec<FilterFieldConfig>,
}

/// A filterable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterFieldConfig {
    pub field: FieldPath,
    pub label: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub options: Vec<FilterOption>,
}

impl FilterFieldConfig {
    /// True if `value` is one of the declared options.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Select,
    Multiselect,
    Text,
    Number,
    Date,
    DateRange,
    Boolean,
}

impl FilterType {
    /// Types whose values must come from the declared options.
    pub fn is_enumerable(&self) -> bool {
        matches!(self, FilterType::Select | FilterType::Multiselect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Sort choices offered by the toolbar in addition to sortable columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOptionsConfig {
    #[serde(default)]
    pub fields: Vec<SortOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOption {
    pub field: FieldPath,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub formats: Vec<ExportFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Actions
// =============================================================================

/// A primary, row or bulk action declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub variant: ActionVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationConfig>,
    /// Permission the action needs, overriding the scope default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<PermissionKind>,
}

impl ActionConfig {
    pub fn is_destructive(&self) -> bool {
        self.variant == ActionVariant::Destructive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVariant {
    #[default]
    Default,
    Primary,
    Secondary,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationConfig {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_label: Option<String>,
}

// =============================================================================
// Permissions
// =============================================================================

/// Role lists per permission kind. An absent list leaves the kind
/// unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<Vec<String>>,
}

impl PermissionsConfig {
    /// Roles listed for a permission kind.
    pub fn roles(&self, kind: PermissionKind) -> Option<&[String]> {
        let roles = match kind {
            PermissionKind::Create => &self.create,
            PermissionKind::Read => &self.read,
            PermissionKind::Update => &self.update,
            PermissionKind::Delete => &self.delete,
            PermissionKind::Export => &self.export,
            PermissionKind::Import => &self.import,
        };
        roles.as_deref()
    }
}
