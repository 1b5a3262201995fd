//! Format Registry.
//!
//! Maps every [`ColumnFormat`] variant to a pure formatting function. Every
//! function is total: null and missing values render the configured
//! placeholder, and values that do not fit their declared format degrade to
//! a textual fallback instead of failing the view.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pageview_core::value::{value_bool, value_datetime, value_number, value_text};
use pageview_core::{ColumnFormat, FieldPath, FormatDefaults, Record};

// =============================================================================
// Output types
// =============================================================================

/// A formatted cell: display text plus optional style metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedValue {
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<CellStyle>,
}

impl FormattedValue {
    pub fn plain(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            style: None,
        }
    }

    pub fn styled(display: impl Into<String>, style: CellStyle) -> Self {
        Self {
            display: display.into(),
            style: Some(style),
        }
    }
}

/// Style metadata for renderers. Carries no UI-framework vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CellStyle {
    /// Right-aligned numeric content.
    Numeric,
    /// `mapped` is false when the colour is the neutral fallback.
    Badge { color: String, mapped: bool },
    Boolean { value: bool },
    Link { href: String, external: bool },
    Avatar {
        initials: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    /// Unrendered custom value for the outer UI.
    Custom { renderer: String, payload: Value },
}

/// External renderer for `custom` formats.
///
/// Receives the raw value and the descriptor's render hint. The engine never
/// interprets custom semantics itself.
pub trait CustomRenderer: Send + Sync {
    fn render(&self, hint: &str, value: &Value) -> FormattedValue;
}

// =============================================================================
// FormatRegistry
// =============================================================================

/// Formats raw field values per column format.
#[derive(Clone)]
pub struct FormatRegistry {
    defaults: FormatDefaults,
    custom: Option<Arc<dyn CustomRenderer>>,
}

impl FormatRegistry {
    pub fn new(defaults: FormatDefaults) -> Self {
        Self {
            defaults,
            custom: None,
        }
    }

    /// Register the external renderer for `custom` formats.
    pub fn with_custom_renderer(mut self, renderer: Arc<dyn CustomRenderer>) -> Self {
        self.custom = Some(renderer);
        self
    }

    pub fn defaults(&self) -> &FormatDefaults {
        &self.defaults
    }

    /// The empty placeholder.
    pub fn placeholder(&self) -> FormattedValue {
        FormattedValue::plain(self.defaults.empty_placeholder.clone())
    }

    /// Format a value that has no surrounding record.
    pub fn format(&self, value: Option<&Value>, format: &ColumnFormat) -> FormattedValue {
        self.format_with(value, format, None)
    }

    /// Format a record field. Link and avatar formats may read sibling
    /// fields of the same record.
    pub fn format_field(
        &self,
        record: &Record,
        field: &FieldPath,
        format: &ColumnFormat,
    ) -> FormattedValue {
        self.format_with(record.get(field), format, Some(record))
    }

    fn format_with(
        &self,
        value: Option<&Value>,
        format: &ColumnFormat,
        record: Option<&Record>,
    ) -> FormattedValue {
        let value = match value {
            None | Some(Value::Null) => return self.placeholder(),
            Some(v) => v,
        };

        match format {
            ColumnFormat::Text => self.text(value),
            ColumnFormat::Number { decimals } => self.number(value, *decimals),
            ColumnFormat::Currency { currency, decimals } => {
                self.currency(value, currency, *decimals)
            }
            ColumnFormat::Percentage { decimals } => self.percentage(value, *decimals),
            ColumnFormat::Date { pattern } => {
                let pattern = pattern.as_deref().unwrap_or(&self.defaults.date_pattern);
                self.temporal(value, pattern)
            }
            ColumnFormat::Datetime { pattern } => {
                let pattern = pattern
                    .as_deref()
                    .unwrap_or(&self.defaults.datetime_pattern);
                self.temporal(value, pattern)
            }
            ColumnFormat::Boolean {
                true_label,
                false_label,
            } => self.boolean(value, true_label.as_deref(), false_label.as_deref()),
            ColumnFormat::Badge { color_map } => {
                let key = value_text(value).unwrap_or_default();
                let (color, mapped) = match color_map.get(&key) {
                    Some(color) => (color.clone(), true),
                    None => (self.defaults.badge_default_color.clone(), false),
                };
                FormattedValue::styled(key, CellStyle::Badge { color, mapped })
            }
            ColumnFormat::Link {
                href_field,
                external,
            } => {
                let display = value_text(value).unwrap_or_default();
                let href = href_field
                    .as_ref()
                    .zip(record)
                    .and_then(|(f, r)| r.get(f))
                    .and_then(value_text)
                    .unwrap_or_else(|| display.clone());
                FormattedValue::styled(
                    display,
                    CellStyle::Link {
                        href,
                        external: *external,
                    },
                )
            }
            ColumnFormat::Avatar { image_field } => {
                let display = value_text(value).unwrap_or_default();
                let image = image_field
                    .as_ref()
                    .zip(record)
                    .and_then(|(f, r)| r.get(f))
                    .and_then(value_text);
                FormattedValue::styled(
                    display.clone(),
                    CellStyle::Avatar {
                        initials: initials(&display),
                        image,
                    },
                )
            }
            ColumnFormat::Custom { renderer } => match &self.custom {
                Some(custom) => custom.render(renderer, value),
                None => FormattedValue::styled(
                    value_text(value).unwrap_or_default(),
                    CellStyle::Custom {
                        renderer: renderer.clone(),
                        payload: value.clone(),
                    },
                ),
            },
        }
    }

    // -------------------------------------------------------------------------
    // Variant formatters
    // -------------------------------------------------------------------------

    fn text(&self, value: &Value) -> FormattedValue {
        FormattedValue::plain(value_text(value).unwrap_or_default())
    }

    fn number(&self, value: &Value, decimals: Option<u8>) -> FormattedValue {
        match value_number(value) {
            Some(n) => FormattedValue::styled(group_number(n, decimals), CellStyle::Numeric),
            None => self.not_numeric(value, "number"),
        }
    }

    fn currency(&self, value: &Value, currency: &str, decimals: Option<u8>) -> FormattedValue {
        let Some(n) = value_number(value) else {
            return self.not_numeric(value, "currency");
        };
        let decimals = decimals.unwrap_or_else(|| currency_decimals(currency));
        let amount = group_number(n.abs(), Some(decimals));
        let sign = if n < 0.0 && amount.chars().any(|c| c.is_ascii_digit() && c != '0') {
            "-"
        } else {
            ""
        };
        let display = match currency_symbol(currency) {
            Some(symbol) => format!("{sign}{symbol}{amount}"),
            None => format!("{sign}{} {amount}", currency.to_uppercase()),
        };
        FormattedValue::styled(display, CellStyle::Numeric)
    }

    fn percentage(&self, value: &Value, decimals: Option<u8>) -> FormattedValue {
        match value_number(value) {
            Some(n) => FormattedValue::styled(
                format!("{}%", group_number(n, decimals)),
                CellStyle::Numeric,
            ),
            None => self.not_numeric(value, "percentage"),
        }
    }

    fn temporal(&self, value: &Value, pattern: &str) -> FormattedValue {
        let raw = value_text(value).unwrap_or_default();
        let Some(dt) = value_datetime(value) else {
            tracing::trace!(value = %raw, "date parse failed, rendering raw value");
            return FormattedValue::plain(raw);
        };
        let mut display = String::new();
        if write!(display, "{}", dt.format(pattern)).is_err() {
            tracing::trace!(pattern, "invalid date pattern, rendering raw value");
            return FormattedValue::plain(raw);
        }
        FormattedValue::plain(display)
    }

    fn boolean(
        &self,
        value: &Value,
        true_label: Option<&str>,
        false_label: Option<&str>,
    ) -> FormattedValue {
        match value_bool(value) {
            Some(true) => FormattedValue::styled(
                true_label.unwrap_or("Yes"),
                CellStyle::Boolean { value: true },
            ),
            Some(false) => FormattedValue::styled(
                false_label.unwrap_or("No"),
                CellStyle::Boolean { value: false },
            ),
            None => self.text(value),
        }
    }

    fn not_numeric(&self, value: &Value, format: &'static str) -> FormattedValue {
        tracing::trace!(%value, format, "non-numeric value, rendering placeholder");
        self.placeholder()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new(FormatDefaults::default())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Format with thousands separators.
///
/// Without explicit decimals, integers render bare and fractions keep up to
/// two significant decimals.
pub fn group_number(n: f64, decimals: Option<u8>) -> String {
    let fixed = match decimals {
        Some(d) => format!("{:.*}", usize::from(d), n.abs()),
        None => {
            let s = format!("{:.2}", n.abs());
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    };
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    let is_zero = !grouped.chars().any(|c| c.is_ascii_digit() && c != '0');
    if n < 0.0 && !is_zero {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        "CAD" => Some("CA$"),
        "AUD" => Some("A$"),
        _ => None,
    }
}

fn currency_decimals(code: &str) -> u8 {
    match code.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" => 0,
        _ => 2,
    }
}

/// Up to two uppercase initials from a display name.
fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn all_formats() -> Vec<ColumnFormat> {
        vec![
            ColumnFormat::Text,
            ColumnFormat::Number { decimals: None },
            ColumnFormat::Currency {
                currency: "USD".to_string(),
                decimals: None,
            },
            ColumnFormat::Percentage { decimals: Some(1) },
            ColumnFormat::Date { pattern: None },
            ColumnFormat::Datetime { pattern: None },
            ColumnFormat::Boolean {
                true_label: None,
                false_label: None,
            },
            ColumnFormat::Badge {
                color_map: BTreeMap::new(),
            },
            ColumnFormat::Link {
                href_field: None,
                external: false,
            },
            ColumnFormat::Avatar { image_field: None },
            ColumnFormat::Custom {
                renderer: "sparkline".to_string(),
            },
        ]
    }

    fn badge(entries: &[(&str, &str)]) -> ColumnFormat {
        ColumnFormat::Badge {
            color_map: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_null_and_missing_render_placeholder_for_every_variant() {
        let registry = FormatRegistry::default();
        for format in all_formats() {
            assert_eq!(registry.format(None, &format).display, "—", "{format:?}");
            assert_eq!(
                registry.format(Some(&Value::Null), &format).display,
                "—",
                "{format:?}"
            );
        }
    }

    #[test]
    fn test_configured_placeholder() {
        let registry = FormatRegistry::new(FormatDefaults {
            empty_placeholder: "n/a".to_string(),
            ..FormatDefaults::default()
        });
        assert_eq!(registry.format(None, &ColumnFormat::Text).display, "n/a");
    }

    #[test]
    fn test_non_numeric_renders_placeholder() {
        let registry = FormatRegistry::default();
        for format in [
            ColumnFormat::Number { decimals: None },
            ColumnFormat::Currency {
                currency: "EUR".to_string(),
                decimals: None,
            },
            ColumnFormat::Percentage { decimals: None },
        ] {
            let out = registry.format(Some(&json!("twelve")), &format);
            assert_eq!(out.display, "—");
            assert!(!out.display.contains("NaN"));
        }
    }

    #[test]
    fn test_number_grouping() {
        let registry = FormatRegistry::default();
        let fmt = ColumnFormat::Number { decimals: None };
        assert_eq!(registry.format(Some(&json!(1234567)), &fmt).display, "1,234,567");
        assert_eq!(registry.format(Some(&json!(1234.5)), &fmt).display, "1,234.5");
        assert_eq!(registry.format(Some(&json!(-999)), &fmt).display, "-999");
        assert_eq!(registry.format(Some(&json!("42")), &fmt).display, "42");

        let fixed = ColumnFormat::Number { decimals: Some(2) };
        assert_eq!(registry.format(Some(&json!(3)), &fixed).display, "3.00");
    }

    #[test]
    fn test_currency() {
        let registry = FormatRegistry::default();
        let usd = ColumnFormat::Currency {
            currency: "USD".to_string(),
            decimals: None,
        };
        assert_eq!(registry.format(Some(&json!(1234.5)), &usd).display, "$1,234.50");
        assert_eq!(registry.format(Some(&json!(-20)), &usd).display, "-$20.00");

        let jpy = ColumnFormat::Currency {
            currency: "JPY".to_string(),
            decimals: None,
        };
        assert_eq!(registry.format(Some(&json!(5000)), &jpy).display, "¥5,000");

        let chf = ColumnFormat::Currency {
            currency: "chf".to_string(),
            decimals: None,
        };
        assert_eq!(registry.format(Some(&json!(10)), &chf).display, "CHF 10.00");
    }

    #[test]
    fn test_percentage() {
        let registry = FormatRegistry::default();
        let pct = ColumnFormat::Percentage { decimals: Some(1) };
        assert_eq!(registry.format(Some(&json!(45)), &pct).display, "45.0%");
        let pct = ColumnFormat::Percentage { decimals: None };
        assert_eq!(registry.format(Some(&json!(12.5)), &pct).display, "12.5%");
    }

    #[test]
    fn test_dates_degrade_to_raw() {
        let registry = FormatRegistry::default();
        let date = ColumnFormat::Date { pattern: None };
        assert_eq!(
            registry.format(Some(&json!("2024-03-05")), &date).display,
            "Mar 5, 2024"
        );
        assert_eq!(
            registry.format(Some(&json!("sometime soon")), &date).display,
            "sometime soon"
        );

        let datetime = ColumnFormat::Datetime {
            pattern: Some("%Y/%m/%d %H:%M".to_string()),
        };
        assert_eq!(
            registry
                .format(Some(&json!("2024-03-05T09:15:00Z")), &datetime)
                .display,
            "2024/03/05 09:15"
        );
    }

    #[test]
    fn test_badge_mapped_and_unmapped() {
        let registry = FormatRegistry::default();
        let fmt = badge(&[("active", "green"), ("overdue", "red")]);

        for (key, color) in [("active", "green"), ("overdue", "red")] {
            let out = registry.format(Some(&json!(key)), &fmt);
            assert_eq!(out.display, key);
            assert_eq!(
                out.style,
                Some(CellStyle::Badge {
                    color: color.to_string(),
                    mapped: true
                })
            );
        }

        for key in ["draft", "", "ACTIVE", "pending_review"] {
            let out = registry.format(Some(&json!(key)), &fmt);
            assert_eq!(
                out.style,
                Some(CellStyle::Badge {
                    color: "gray".to_string(),
                    mapped: false
                })
            );
        }
    }

    #[test]
    fn test_badge_stringifies_non_string_keys() {
        let registry = FormatRegistry::default();
        let fmt = badge(&[("true", "green"), ("3", "blue")]);
        let out = registry.format(Some(&json!(true)), &fmt);
        assert!(matches!(out.style, Some(CellStyle::Badge { mapped: true, .. })));
        let out = registry.format(Some(&json!(3)), &fmt);
        assert!(matches!(out.style, Some(CellStyle::Badge { mapped: true, .. })));
    }

    #[test]
    fn test_boolean_labels() {
        let registry = FormatRegistry::default();
        let fmt = ColumnFormat::Boolean {
            true_label: Some("Paid".to_string()),
            false_label: None,
        };
        assert_eq!(registry.format(Some(&json!(true)), &fmt).display, "Paid");
        assert_eq!(registry.format(Some(&json!("false")), &fmt).display, "No");
        assert_eq!(registry.format(Some(&json!("maybe")), &fmt).display, "maybe");
    }

    #[test]
    fn test_link_and_avatar_read_sibling_fields() {
        let registry = FormatRegistry::default();
        let record = Record::from_value(json!({
            "id": "1",
            "name": "ada lovelace",
            "url": "https://example.com/ada",
            "photo": "ada.png"
        }))
        .unwrap();
        let name = FieldPath::parse("name").unwrap();

        let link = ColumnFormat::Link {
            href_field: Some(FieldPath::parse("url").unwrap()),
            external: true,
        };
        let out = registry.format_field(&record, &name, &link);
        assert_eq!(
            out.style,
            Some(CellStyle::Link {
                href: "https://example.com/ada".to_string(),
                external: true
            })
        );

        let avatar = ColumnFormat::Avatar {
            image_field: Some(FieldPath::parse("photo").unwrap()),
        };
        let out = registry.format_field(&record, &name, &avatar);
        assert_eq!(
            out.style,
            Some(CellStyle::Avatar {
                initials: "AL".to_string(),
                image: Some("ada.png".to_string())
            })
        );
    }

    struct Stars;

    impl CustomRenderer for Stars {
        fn render(&self, hint: &str, value: &Value) -> FormattedValue {
            let n = value.as_u64().unwrap_or(0) as usize;
            FormattedValue::plain(format!("{hint}:{}", "*".repeat(n)))
        }
    }

    #[test]
    fn test_custom_delegates_to_renderer() {
        let fmt = ColumnFormat::Custom {
            renderer: "rating".to_string(),
        };

        let bare = FormatRegistry::default();
        let out = bare.format(Some(&json!(3)), &fmt);
        assert_eq!(out.display, "3");
        assert!(matches!(out.style, Some(CellStyle::Custom { .. })));

        let registry = FormatRegistry::default().with_custom_renderer(Arc::new(Stars));
        assert_eq!(registry.format(Some(&json!(3)), &fmt).display, "rating:***");
    }

    #[test]
    fn test_group_number_negative_zero() {
        assert_eq!(group_number(-0.001, Some(2)), "0.00");
        assert_eq!(group_number(-0.0, None), "0");
    }
}
