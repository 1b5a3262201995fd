//! Column format variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::FieldPath;

/// How a raw field value is rendered.
///
/// Closed set: adding a variant forces every formatter and renderer match to
/// handle it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnFormat {
    /// Stringified value.
    #[default]
    Text,

    /// Grouped number with optional fixed decimals.
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<u8>,
    },

    /// Monetary amount in an ISO 4217 currency.
    Currency {
        #[serde(default = "default_currency")]
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<u8>,
    },

    /// Value already expressed in percent (`12.5` renders as `12.5%`).
    Percentage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<u8>,
    },

    /// Calendar date, chrono `strftime` pattern.
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },

    /// Date and time, chrono `strftime` pattern.
    Datetime {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        true_label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        false_label: Option<String>,
    },

    /// Coloured badge. Keys are stringified field values.
    #[serde(rename_all = "camelCase")]
    Badge {
        #[serde(default)]
        color_map: BTreeMap<String, String>,
    },

    /// Hyperlink. Without `hrefField` the value itself is the target.
    #[serde(rename_all = "camelCase")]
    Link {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        href_field: Option<FieldPath>,
        #[serde(default)]
        external: bool,
    },

    /// Person avatar with initials derived from the value.
    #[serde(rename_all = "camelCase")]
    Avatar {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_field: Option<FieldPath>,
    },

    /// Opaque escape hatch handed to an external renderer.
    Custom { renderer: String },
}

fn default_currency() -> String {
    "USD".to_string()
}

impl ColumnFormat {
    /// Variant name as used in descriptors.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFormat::Text => "text",
            ColumnFormat::Number { .. } => "number",
            ColumnFormat::Currency { .. } => "currency",
            ColumnFormat::Percentage { .. } => "percentage",
            ColumnFormat::Date { .. } => "date",
            ColumnFormat::Datetime { .. } => "datetime",
            ColumnFormat::Boolean { .. } => "boolean",
            ColumnFormat::Badge { .. } => "badge",
            ColumnFormat::Link { .. } => "link",
            ColumnFormat::Avatar { .. } => "avatar",
            ColumnFormat::Custom { .. } => "custom",
        }
    }

    /// Extra record fields this format reads besides the column's own field.
    pub fn auxiliary_fields(&self) -> Vec<&FieldPath> {
        match self {
            ColumnFormat::Link {
                href_field: Some(f),
                ..
            }
            | ColumnFormat::Avatar {
                image_field: Some(f),
            } => vec![f],
            _ => Vec::new(),
        }
    }
}
