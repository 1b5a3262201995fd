//! Evaluation of query descriptors over in-memory records.

use std::cmp::Ordering;

use serde_json::Value;

use pageview_core::value::{compare_values, value_date, value_number, value_text};
use pageview_core::{Condition, QueryDescriptor, Record, SearchPredicate, SortDirection, SortKey};

/// Filter, sort, paginate and project `records`.
///
/// Returns the page and the total match count before pagination. Sorting is
/// stable, so records with equal keys keep their input order.
pub fn apply_query(records: &[Record], query: &QueryDescriptor) -> (Vec<Record>, usize) {
    let mut matched: Vec<&Record> = records.iter().filter(|r| matches_query(r, query)).collect();
    let total = matched.len();

    if !query.sort.is_empty() {
        matched.sort_by(|a, b| compare_records(a, b, &query.sort));
    }

    let page = matched
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|r| r.project(&query.fields))
        .collect();

    (page, total)
}

/// True if a record satisfies every predicate and the search.
pub fn matches_query(record: &Record, query: &QueryDescriptor) -> bool {
    let predicates_hold = query
        .predicates
        .iter()
        .all(|p| matches_condition(record.get(&p.field), &p.condition));

    predicates_hold
        && query
            .search
            .as_ref()
            .map_or(true, |search| matches_search(record, search))
}

fn matches_search(record: &Record, search: &SearchPredicate) -> bool {
    let needle = search.text.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let contains = |value: &Value| {
        value_text(value).is_some_and(|text| text.to_lowercase().contains(&needle))
    };

    if search.fields.is_empty() {
        record.values().values().any(contains)
    } else {
        search
            .fields
            .iter()
            .filter_map(|f| record.get(f))
            .any(contains)
    }
}

/// Evaluate one condition against a field value. Missing and `null` are
/// equivalent.
pub fn matches_condition(value: Option<&Value>, condition: &Condition) -> bool {
    let value = value.filter(|v| !v.is_null());

    match condition {
        Condition::IsNull => value.is_none(),
        Condition::IsNotNull => value.is_some(),
        Condition::Equals { value: expected } => match value {
            Some(v) => candidates(v).any(|c| Some(c) == value_text(expected)),
            None => expected.is_null(),
        },
        Condition::NotEquals { value: expected } => {
            !matches_condition(value, &Condition::Equals { value: expected.clone() })
        }
        Condition::OneOf { values } => value.is_some_and(|v| {
            let wanted: Vec<String> = values.iter().filter_map(value_text).collect();
            candidates(v).any(|c| wanted.contains(&c))
        }),
        Condition::Contains { text } => {
            let needle = text.to_lowercase();
            value
                .and_then(value_text)
                .is_some_and(|t| t.to_lowercase().contains(&needle))
        }
        Condition::Compare { comparison, value: right } => value
            .and_then(value_number)
            .is_some_and(|left| comparison.holds(left, *right)),
        Condition::NumberRange { min, max } => value.and_then(value_number).is_some_and(|n| {
            min.map_or(true, |min| n >= min) && max.map_or(true, |max| n <= max)
        }),
        Condition::DateRange { from, to } => value.and_then(value_date).is_some_and(|d| {
            from.map_or(true, |from| d >= from) && to.map_or(true, |to| d <= to)
        }),
    }
}

/// Stringified values a scalar or array field can match on.
fn candidates(value: &Value) -> Box<dyn Iterator<Item = String> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter().filter_map(value_text)),
        other => Box::new(value_text(other).into_iter()),
    }
}

/// Compare two records by sort keys in order.
///
/// Missing and `null` values sort last in both directions.
pub fn compare_records(a: &Record, b: &Record, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(&key.field).filter(|v| !v.is_null());
        let right = b.get(&key.field).filter(|v| !v.is_null());

        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => match key.direction {
                SortDirection::Asc => compare_values(x, y),
                SortDirection::Desc => compare_values(y, x),
            },
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
