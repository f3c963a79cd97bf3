use crate::common::{
    field_value, group_by, search, sort_by_keys, SortKey, GROUP_KEY, GROUP_VALUES,
};
use crate::query::Predicate;
use itertools::Itertools;
use serde_json::{Map, Value};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub type ModifyFn = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// One step of a query pipeline.
///
/// Steps run in the order they were appended, each over the output of the previous
/// one. After a `GroupBy` the elements are `{key, values}` objects, so later steps see
/// groups rather than records.
#[derive(Clone)]
pub enum QueryOp {
    Filter(Predicate),
    OrderBy(Vec<SortKey>),
    Limit(usize),
    Offset(usize),
    /// 1-indexed page of `size` elements. Page 0 reads as page 1.
    Page { page: usize, size: usize },
    Reverse,
    GroupBy(String),
    Modify { id: u64, f: ModifyFn },
    Search {
        query: String,
        fields: Vec<String>,
        threshold: f64,
    },
}

impl QueryOp {
    /// Whether this step rewrites records, which disables memoization.
    pub fn is_mutation(&self) -> bool {
        matches!(self, QueryOp::Modify { .. })
    }

    pub fn apply(&self, data: Vec<Value>) -> Vec<Value> {
        match self {
            QueryOp::Filter(predicate) => data
                .into_iter()
                .filter(|record| predicate.evaluate(record))
                .collect(),
            QueryOp::OrderBy(keys) => sort_by_keys(data, keys),
            QueryOp::Limit(n) => data.into_iter().take(*n).collect(),
            QueryOp::Offset(n) => data.into_iter().skip(*n).collect(),
            QueryOp::Page { page, size } => {
                let start = (*page).max(1).saturating_sub(1).saturating_mul(*size);
                data.into_iter().skip(start).take(*size).collect()
            }
            QueryOp::Reverse => data.into_iter().rev().collect(),
            QueryOp::GroupBy(field) => group_by(data, |record| {
                field_value(record, field).cloned().unwrap_or(Value::Null)
            })
            .into_values()
            .map(|group| {
                let mut shaped = Map::new();
                shaped.insert(GROUP_KEY.to_string(), group.key);
                shaped.insert(GROUP_VALUES.to_string(), Value::Array(group.values));
                Value::Object(shaped)
            })
            .collect(),
            QueryOp::Modify { f, .. } => data
                .into_iter()
                .map(|mut record| {
                    f(&mut record);
                    record
                })
                .collect(),
            QueryOp::Search {
                query,
                fields,
                threshold,
            } => search(data, query, fields, *threshold),
        }
    }
}

impl Display for QueryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryOp::Filter(predicate) => write!(f, "filter({})", predicate),
            QueryOp::OrderBy(keys) => write!(
                f,
                "order_by({})",
                keys.iter()
                    .map(|key| format!("{} {}", key.field, key.order.tag()))
                    .join(", ")
            ),
            QueryOp::Limit(n) => write!(f, "limit({})", n),
            QueryOp::Offset(n) => write!(f, "offset({})", n),
            QueryOp::Page { page, size } => write!(f, "page({}, {})", page, size),
            QueryOp::Reverse => write!(f, "reverse"),
            QueryOp::GroupBy(field) => write!(f, "group_by({})", field),
            QueryOp::Modify { id, .. } => write!(f, "modify(fn#{})", id),
            QueryOp::Search {
                query,
                fields,
                threshold,
            } => write!(
                f,
                "search({}, [{}], {})",
                Value::from(query.as_str()),
                fields.iter().join(", "),
                threshold
            ),
        }
    }
}

impl Debug for QueryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryOp({})", self)
    }
}
