//! Query descriptors and live result snapshots.
//!
//! A [`Query`] selects one collection with an optional filter, ordering
//! and limit. Subscribing to a query yields a stream of [`QuerySnapshot`]
//! values; the stream is the *only* channel through which committed
//! mutations become visible to a process, so consumers must re-evaluate
//! their derived state on every snapshot, not just the first.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::StoreError;
use crate::types::{Record, RecordId};

/// Row filter for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Scalar field equals the given value.
    FieldEq(String, Value),
    /// Relation link points at the given record.
    LinkEq(String, RecordId),
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::FieldEq(name, value) => record.fields.get(name) == Some(value),
            Filter::LinkEq(field, target) => record.links.get(field) == Some(target),
        }
    }
}

/// Result ordering on a scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

/// A reactive query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Start a query over the given collection.
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filter: None,
            order: None,
            limit: None,
        }
    }

    /// Keep rows whose scalar field equals `value`.
    pub fn field_eq(mut self, name: &str, value: Value) -> Self {
        self.filter = Some(Filter::FieldEq(name.to_string(), value));
        self
    }

    /// Keep rows whose relation link points at `target`.
    pub fn link_eq(mut self, field: &str, target: RecordId) -> Self {
        self.filter = Some(Filter::LinkEq(field.to_string(), target));
        self
    }

    /// Order ascending by a scalar field.
    pub fn order_asc(mut self, field: &str) -> Self {
        self.order = Some(Order {
            field: field.to_string(),
            descending: false,
        });
        self
    }

    /// Order descending by a scalar field.
    pub fn order_desc(mut self, field: &str) -> Self {
        self.order = Some(Order {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    /// Cap the result set size.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Evaluate against one collection's records.
    ///
    /// Unordered queries keep the collection's id order, which is stable
    /// within one store and makes `limit(1)` deterministic.
    pub fn evaluate(&self, records: &BTreeMap<RecordId, Record>) -> Vec<(RecordId, Record)> {
        let mut rows: Vec<(RecordId, Record)> = records
            .iter()
            .filter(|(_, r)| self.filter.as_ref().map_or(true, |f| f.matches(r)))
            .map(|(id, r)| (*id, r.clone()))
            .collect();

        if let Some(order) = &self.order {
            rows.sort_by(|(_, a), (_, b)| {
                let cmp = cmp_values(a.fields.get(&order.field), b.fields.get(&order.field));
                if order.descending {
                    cmp.reverse()
                } else {
                    cmp
                }
            });
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Ordering over JSON values: absent < null < bool < number < string.
/// Arrays and objects compare equal (no meaningful order on them here).
fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// One state of a live result set.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    /// True until the subscription has produced its first result.
    pub loading: bool,
    pub rows: Vec<(RecordId, Record)>,
    pub error: Option<StoreError>,
}

impl QuerySnapshot {
    /// Snapshot before the first result has arrived.
    pub fn loading() -> Self {
        Self {
            loading: true,
            rows: Vec::new(),
            error: None,
        }
    }

    /// Snapshot carrying a resolved result set.
    pub fn ready(rows: Vec<(RecordId, Record)>) -> Self {
        Self {
            loading: false,
            rows,
            error: None,
        }
    }

    /// Snapshot carrying a subscription failure.
    pub fn failed(error: StoreError) -> Self {
        Self {
            loading: false,
            rows: Vec::new(),
            error: Some(error),
        }
    }

    /// True once resolved with zero rows and no error.
    pub fn is_empty(&self) -> bool {
        !self.loading && self.error.is_none() && self.rows.is_empty()
    }
}
