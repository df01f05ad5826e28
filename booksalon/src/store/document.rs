//! Document representation plus the field-op, filter and ordering engine shared
//! by every store implementation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};

use crate::errors::SalonError;

use super::{Cursor, FieldOp, Filter, FilterOp, OrderBy, Query, SortOrder};

/// One stored document: its id plus the JSON object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self { id: id.into(), data }
    }

    /// Deserializes the body, exposing the document id as `id` when the body has none.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SalonError> {
        let mut map = self.data.clone();
        map.entry("id").or_insert_with(|| Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Value at a dotted path (`unreadCount.uid`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.data, path)
    }

    pub fn cursor(&self, order_by: &[OrderBy]) -> Cursor {
        Cursor {
            id: self.id.clone(),
            values: order_by
                .iter()
                .map(|order| self.field(&order.field).cloned().unwrap_or(Value::Null))
                .collect(),
        }
    }
}

/// Serializes a model into a document body.
pub fn encode<T: Serialize>(value: &T) -> Result<Map<String, Value>, SalonError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SalonError::Other {
            message: format!("document body must be a JSON object, got {other}").into(),
        }),
    }
}

pub(crate) fn into_object(data: Value) -> Result<Map<String, Value>, SalonError> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(SalonError::Other {
            message: format!("document body must be a JSON object, got {other}").into(),
        }),
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.').filter(|segment| !segment.is_empty());
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Applies field ops in order. Intermediate objects are created as needed.
pub fn apply_ops(data: &mut Map<String, Value>, ops: &[FieldOp]) -> Result<(), SalonError> {
    for op in ops {
        let path = op.path();
        let segments: Vec<&str> = path.split('.').filter(|segment| !segment.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };
        if let FieldOp::Delete(_) = op {
            if let Some(parent) = existing_parent_mut(data, parents) {
                parent.remove(*last);
            }
            continue;
        }
        let parent = parent_map_mut(data, parents)?;
        match op {
            FieldOp::Set(_, value) => {
                parent.insert((*last).to_string(), value.clone());
            }
            FieldOp::Increment(_, delta) => {
                let next = match parent.get(*last) {
                    Some(Value::Number(current)) => add_number(current, *delta),
                    _ => Value::from(*delta),
                };
                parent.insert((*last).to_string(), next);
            }
            FieldOp::ArrayUnion(_, values) => {
                let slot = parent.entry((*last).to_string()).or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    for value in values {
                        if !items.iter().any(|item| values_equal(item, value)) {
                            items.push(value.clone());
                        }
                    }
                }
            }
            FieldOp::ArrayRemove(_, values) => {
                let slot = parent.entry((*last).to_string()).or_insert_with(|| Value::Array(Vec::new()));
                match slot {
                    Value::Array(items) => items.retain(|item| !values.iter().any(|value| values_equal(item, value))),
                    other => *other = Value::Array(Vec::new()),
                }
            }
            FieldOp::Delete(_) => {}
        }
    }
    Ok(())
}

fn add_number(current: &Number, delta: i64) -> Value {
    if let Some(value) = current.as_i64() {
        return Value::from(value.saturating_add(delta));
    }
    let value = current.as_f64().unwrap_or(0.0) + delta as f64;
    Number::from_f64(value).map(Value::Number).unwrap_or_else(|| Value::from(delta))
}

fn parent_map_mut<'a>(
    target: &'a mut Map<String, Value>,
    segments: &[&str],
) -> Result<&'a mut Map<String, Value>, SalonError> {
    let mut current = target;
    for segment in segments {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(SalonError::Other {
                    message: format!("path segment '{segment}' is not an object").into(),
                });
            }
        };
    }
    Ok(current)
}

fn existing_parent_mut<'a>(target: &'a mut Map<String, Value>, segments: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut current = target;
    for segment in segments {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    Some(current)
}

/// Deep-merges `patch` into `target`; nested objects merge, everything else replaces.
pub fn merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        let Value::Object(incoming) = value else {
            target.insert(key, value);
            continue;
        };
        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            merge(existing, incoming);
            continue;
        }
        target.insert(key, Value::Object(incoming));
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(0.0);
                let b = b.as_f64().unwrap_or(0.0);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

/// Equality that treats `1` and `1.0` as the same number.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare_values(left, right) == Ordering::Equal,
        _ => left == right,
    }
}

pub fn matches_filter(document: &Document, filter: &Filter) -> bool {
    let Some(actual) = document.field(&filter.field) else {
        return false;
    };
    let comparable = || type_rank(actual) == type_rank(&filter.value);
    match filter.op {
        FilterOp::Eq => values_equal(actual, &filter.value),
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|candidate| values_equal(actual, candidate))),
        FilterOp::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(item, &filter.value))),
        FilterOp::Gt => comparable() && compare_values(actual, &filter.value) == Ordering::Greater,
        FilterOp::Gte => comparable() && compare_values(actual, &filter.value) != Ordering::Less,
        FilterOp::Lt => comparable() && compare_values(actual, &filter.value) == Ordering::Less,
        FilterOp::Lte => comparable() && compare_values(actual, &filter.value) != Ordering::Greater,
    }
}

fn compare_keys(left: (&[Value], &str), right: (&[Value], &str), order_by: &[OrderBy]) -> Ordering {
    for (index, order) in order_by.iter().enumerate() {
        let a = left.0.get(index).unwrap_or(&Value::Null);
        let b = right.0.get(index).unwrap_or(&Value::Null);
        let ordering = match order.direction {
            SortOrder::Asc => compare_values(a, b),
            SortOrder::Desc => compare_values(b, a),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.1.cmp(right.1)
}

/// Filters, orders (id as the final tiebreak), applies the cursor and the limit.
///
/// Documents missing an order-by field are excluded, as the remote store does.
pub fn run_query(documents: impl IntoIterator<Item = Document>, query: &Query) -> Vec<Document> {
    let mut keyed: Vec<(Vec<Value>, Document)> = documents
        .into_iter()
        .filter(|document| query.filters.iter().all(|filter| matches_filter(document, filter)))
        .filter(|document| query.order_by.iter().all(|order| document.field(&order.field).is_some()))
        .map(|document| (document.cursor(&query.order_by).values, document))
        .collect();

    keyed.sort_by(|(a_values, a), (b_values, b)| {
        compare_keys(
            (a_values.as_slice(), a.id.as_str()),
            (b_values.as_slice(), b.id.as_str()),
            &query.order_by,
        )
    });

    let iter = keyed.into_iter().filter(|(values, document)| match &query.start_after {
        Some(cursor) => {
            compare_keys(
                (values.as_slice(), document.id.as_str()),
                (cursor.values.as_slice(), cursor.id.as_str()),
                &query.order_by,
            ) == Ordering::Greater
        }
        None => true,
    });

    match query.limit {
        Some(limit) => iter.take(limit).map(|(_, document)| document).collect(),
        None => iter.map(|(_, document)| document).collect(),
    }
}

/// Serialized form of a change notification crossing process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEnvelope {
    pub origin: String,
    #[serde(flatten)]
    pub change: super::Change,
}
