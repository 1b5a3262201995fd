//! Stats Aggregator.
//!
//! Computes summary cards for a page. Each card takes its value from the
//! first available source: the data source's aggregate payload, a literal
//! in the descriptor, or a reduction over the current page of records.

use serde::Serialize;
use serde_json::{Map, Value};

use pageview_core::value::value_number;
use pageview_core::{
    ColumnFormat, Record, StatAggregate, StatFormat, StatItemConfig, StatsConfig, TrendConfig,
};

use crate::format::{FormatRegistry, FormattedValue};
use crate::source::PageResult;

/// One computed stat card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatValue {
    pub id: String,
    pub label: String,
    /// Raw numeric value, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub display: FormattedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

/// Movement against a reference value. Never alters the primary value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub direction: TrendDirection,
    pub sentiment: TrendSentiment,
    pub reference: f64,
    /// Relative change in percent. Absent when the reference is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendSentiment {
    Positive,
    Negative,
    Neutral,
}

/// Compute every stat item against a fetched result.
pub fn compute_stats(
    config: &StatsConfig,
    result: &PageResult,
    registry: &FormatRegistry,
) -> Vec<StatValue> {
    let empty = Map::new();
    let payload = result.stats.as_ref().unwrap_or(&empty);

    config
        .items
        .iter()
        .map(|item| compute_item(item, payload, &result.records, registry))
        .collect()
}

fn compute_item(
    item: &StatItemConfig,
    payload: &Map<String, Value>,
    records: &[Record],
    registry: &FormatRegistry,
) -> StatValue {
    let raw = source_value(item, payload, records);
    let number = raw.as_ref().and_then(value_number);

    let display = match &raw {
        Some(Value::String(s)) if number.is_none() => FormattedValue::plain(s.clone()),
        _ => registry.format(raw.as_ref(), &column_format(item)),
    };

    let trend = item
        .trend
        .as_ref()
        .zip(number)
        .and_then(|(trend, current)| compute_trend(trend, current, payload));

    StatValue {
        id: item.id.clone(),
        label: item.label.clone(),
        value: number,
        display,
        icon: item.icon.clone(),
        trend,
    }
}

fn source_value(
    item: &StatItemConfig,
    payload: &Map<String, Value>,
    records: &[Record],
) -> Option<Value> {
    if let Some(v) = item
        .field
        .as_ref()
        .and_then(|key| payload.get(key))
        .filter(|v| !v.is_null())
    {
        return Some(v.clone());
    }
    if let Some(v) = &item.value {
        return Some(v.clone());
    }
    let aggregate = item.aggregate?;
    reduce(aggregate, item, records).map(Value::from)
}

fn reduce(aggregate: StatAggregate, item: &StatItemConfig, records: &[Record]) -> Option<f64> {
    let Some(field) = &item.aggregate_field else {
        return match aggregate {
            StatAggregate::Count => Some(records.len() as f64),
            _ => None,
        };
    };

    if aggregate == StatAggregate::Count {
        let present = records
            .iter()
            .filter(|r| r.get(field).is_some_and(|v| !v.is_null()))
            .count();
        return Some(present as f64);
    }

    let values: Vec<f64> = records
        .iter()
        .filter_map(|r| r.get(field))
        .filter_map(value_number)
        .collect();
    if values.is_empty() {
        return None;
    }

    Some(match aggregate {
        StatAggregate::Sum => values.iter().sum(),
        StatAggregate::Avg => values.iter().sum::<f64>() / values.len() as f64,
        StatAggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        StatAggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        StatAggregate::Count => values.len() as f64,
    })
}

fn column_format(item: &StatItemConfig) -> ColumnFormat {
    match item.format.unwrap_or_default() {
        StatFormat::Number => ColumnFormat::Number {
            decimals: item.decimals,
        },
        StatFormat::Currency => ColumnFormat::Currency {
            currency: item.currency.clone().unwrap_or_else(|| "USD".to_string()),
            decimals: item.decimals,
        },
        StatFormat::Percentage => ColumnFormat::Percentage {
            decimals: item.decimals,
        },
    }
}

fn compute_trend(config: &TrendConfig, current: f64, payload: &Map<String, Value>) -> Option<Trend> {
    let reference = payload.get(&config.field).and_then(value_number)?;

    let direction = if current > reference {
        TrendDirection::Up
    } else if current < reference {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };
    let sentiment = match (direction, config.invert) {
        (TrendDirection::Flat, _) => TrendSentiment::Neutral,
        (TrendDirection::Up, false) | (TrendDirection::Down, true) => TrendSentiment::Positive,
        (TrendDirection::Up, true) | (TrendDirection::Down, false) => TrendSentiment::Negative,
    };
    let change_percent =
        (reference != 0.0).then(|| (current - reference) * 100.0 / reference.abs());

    Some(Trend {
        direction,
        sentiment,
        reference,
        change_percent,
    })
}
