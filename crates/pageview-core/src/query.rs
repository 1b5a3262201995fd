//! Canonical query descriptor.
//!
//! A `QueryDescriptor` is the single fetchable form of "page config plus
//! toolbar state". It is a value: comparable, serializable, and recreated on
//! every change rather than edited in place.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page::SortDirection;
use crate::record::FieldPath;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchPredicate>,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    /// Primary key first, tie-breakers after.
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub offset: usize,
    /// `None` requests the full result set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Projection. Empty means every field.
    #[serde(default)]
    pub fields: BTreeSet<FieldPath>,
}

impl QueryDescriptor {
    /// Same query without pagination.
    pub fn unpaginated(&self) -> Self {
        Self {
            offset: 0,
            limit: None,
            ..self.clone()
        }
    }

    /// Same query with additional projected fields.
    pub fn with_fields<I>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = FieldPath>,
    {
        let mut fields = self.fields.clone();
        fields.extend(extra);
        Self {
            fields,
            ..self.clone()
        }
    }

    /// True if the projection covers `field`.
    pub fn projects(&self, field: &FieldPath) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f.root() == field.root())
    }

    /// Zero-based page index implied by offset and limit.
    pub fn page_index(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => self.offset / limit,
            _ => 0,
        }
    }
}

/// Case-insensitive substring search over several fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPredicate {
    pub text: String,
    pub fields: Vec<FieldPath>,
}

/// One filter over one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predicate {
    pub field: FieldPath,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(field: FieldPath, condition: Condition) -> Self {
        Self { field, condition }
    }
}

/// Filter condition. Equality compares stringified values, so `true`
/// matches `"true"` and `3` matches `"3"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Condition {
    Equals { value: Value },
    NotEquals { value: Value },
    OneOf { values: Vec<Value> },
    Contains { text: String },
    Compare { comparison: Comparison, value: f64 },
    /// Inclusive numeric range.
    NumberRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Inclusive calendar date range.
    DateRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<NaiveDate>,
    },
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Gte => left >= right,
            Comparison::Lt => left < right,
            Comparison::Lte => left <= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub field: FieldPath,
    pub direction: SortDirection,
}
