use crate::common::{field_value, SortOrder};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One key of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(field: &str, order: SortOrder) -> Self {
        SortKey {
            field: field.to_string(),
            order,
        }
    }
}

/// A group of records sharing one key value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: Value,
    pub values: Vec<Value>,
}

#[inline]
pub(crate) fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values.
///
/// Values of different types order by type (null, bool, number, string, array, object);
/// numbers compare numerically, strings lexicographically, arrays element-wise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => canonical_key(a).cmp(&canonical_key(b)),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compares two optional field values; a missing field sorts like `null`.
#[inline]
pub fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    compare_values(a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null))
}

/// Text form of a value under which numerically equal numbers coincide.
///
/// `1` and `1.0` map to the same key, and object fields are taken in name order.
pub fn canonical_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::Array(items) => {
            format!("[{}]", items.iter().map(canonical_key).join(","))
        }
        Value::Object(map) => {
            let fields = map
                .iter()
                .sorted_by(|(left, _), (right, _)| left.cmp(right))
                .map(|(name, field)| {
                    format!("{}:{}", Value::from(name.as_str()), canonical_key(field))
                })
                .join(",");
            format!("{{{}}}", fields)
        }
        other => other.to_string(),
    }
}

/// Stable multi-key sort: ties on every key keep their prior relative order.
pub fn sort_by_keys(mut data: Vec<Value>, keys: &[SortKey]) -> Vec<Value> {
    if keys.is_empty() {
        return data;
    }

    data.sort_by(|a, b| {
        for key in keys {
            let ordering = compare_fields(field_value(a, &key.field), field_value(b, &key.field));
            let ordering = match key.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    data
}

/// Groups records by the value `key_fn` returns, keeping first-seen group order and
/// the original order inside each group. Keys are compared by [`canonical_key`], and a
/// group keeps the first key value it saw.
pub fn group_by<F>(data: Vec<Value>, key_fn: F) -> IndexMap<String, Group>
where
    F: Fn(&Value) -> Value,
{
    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for record in data {
        let key = key_fn(&record);
        let signature = canonical_key(&key);
        groups
            .entry(signature)
            .or_insert_with(|| Group {
                key,
                values: Vec::new(),
            })
            .values
            .push(record);
    }
    groups
}

/// Returns the record with the smallest key, the first one on ties.
pub fn min_by<F>(data: &[Value], key_fn: F) -> Option<&Value>
where
    F: Fn(&Value) -> Value,
{
    extreme_by(data, key_fn, Ordering::Less)
}

/// Returns the record with the largest key, the first one on ties.
pub fn max_by<F>(data: &[Value], key_fn: F) -> Option<&Value>
where
    F: Fn(&Value) -> Value,
{
    extreme_by(data, key_fn, Ordering::Greater)
}

fn extreme_by<F>(data: &[Value], key_fn: F, wanted: Ordering) -> Option<&Value>
where
    F: Fn(&Value) -> Value,
{
    let mut best: Option<(&Value, Value)> = None;
    for record in data {
        let key = key_fn(record);
        match &best {
            Some((_, best_key)) if compare_values(&key, best_key) != wanted => {}
            _ => best = Some((record, key)),
        }
    }
    best.map(|(record, _)| record)
}
