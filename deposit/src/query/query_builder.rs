use crate::common::{
    field_value, max_by, min_by, numeric_or_zero, Group, SortKey, SortOrder,
    DEFAULT_SEARCH_THRESHOLD,
};
use crate::errors::DepositResult;
use crate::query::predicate::next_closure_id;
use crate::query::{field, ModifyFn, Predicate, QueryOp};
use crate::store::{Adapter, StorageAdapter};
use itertools::Itertools;
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::ops::Bound;
use std::sync::Arc;

/// Lazy, chainable query over one table.
///
/// Chained calls only append steps. A terminal call (`to_vec`, `count`, `first`, ...)
/// fetches the table once through the adapter and runs every step in append order
/// over that snapshot, so `limit(2).offset(1)` and `offset(1).limit(2)` differ.
///
/// Results are memoized per pipeline signature. A pipeline with a `modify` step is
/// never memoized and appending one drops everything cached so far. Memoized results
/// do not see later writes to the table; call [`QueryBuilder::invalidate`] to refetch.
///
/// ```rust,ignore
/// let top = deposit
///     .query("products")
///     .where_(field("price").gt(10))
///     .order_by("price", SortOrder::Descending)
///     .limit(3)
///     .to_vec()?;
/// ```
pub struct QueryBuilder {
    adapter: Adapter,
    table: String,
    steps: Vec<QueryOp>,
    memo: Mutex<Option<LruCache<String, Vec<Value>>>>,
    mutation_version: u64,
}

impl QueryBuilder {
    /// Creates a builder over `table`. A `memo_capacity` of 0 disables memoization.
    pub fn new(adapter: Adapter, table: &str, memo_capacity: usize) -> Self {
        QueryBuilder {
            adapter,
            table: table.to_string(),
            steps: Vec::new(),
            memo: Mutex::new(NonZeroUsize::new(memo_capacity).map(LruCache::new)),
            mutation_version: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn steps(&self) -> &[QueryOp] {
        &self.steps
    }

    /// Deterministic text identifying this pipeline.
    pub fn signature(&self) -> String {
        if self.steps.is_empty() {
            return self.table.clone();
        }
        format!("{}|{}", self.table, self.steps.iter().join("|"))
    }

    fn push(mut self, step: QueryOp) -> Self {
        self.steps.push(step);
        self
    }

    /// Keeps records matching `predicate`.
    pub fn where_(self, predicate: Predicate) -> Self {
        self.push(QueryOp::Filter(predicate))
    }

    pub fn equals<V: Into<Value>>(self, field_name: &str, value: V) -> Self {
        self.where_(field(field_name).eq(value))
    }

    /// Inclusive range filter.
    pub fn between<L: Into<Value>, U: Into<Value>>(self, field_name: &str, lower: L, upper: U) -> Self {
        self.where_(field(field_name).between(lower, upper))
    }

    pub fn between_with(self, field_name: &str, lower: Bound<Value>, upper: Bound<Value>) -> Self {
        self.where_(field(field_name).between_with(lower, upper))
    }

    pub fn starts_with(self, field_name: &str, prefix: &str) -> Self {
        self.where_(field(field_name).starts_with(prefix))
    }

    pub fn any_of<V: Into<Value>>(self, field_name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.where_(field(field_name).any_of(values))
    }

    /// Keeps records for which `f` returns true.
    pub fn filter<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.where_(Predicate::custom(f))
    }

    /// Keeps records not matching `predicate`.
    pub fn not(self, predicate: Predicate) -> Self {
        self.where_(!predicate)
    }

    /// Same as [`QueryBuilder::where_`]; filters always combine with AND.
    pub fn and(self, predicate: Predicate) -> Self {
        self.where_(predicate)
    }

    /// Widens the previous filter step to `previous || predicate`.
    ///
    /// Without a filter right before it, this is a plain filter.
    pub fn or(mut self, predicate: Predicate) -> Self {
        match self.steps.pop() {
            Some(QueryOp::Filter(previous)) => self.push(QueryOp::Filter(previous.or(predicate))),
            other => {
                if let Some(step) = other {
                    self.steps.push(step);
                }
                log::warn!(
                    "or() on {} does not follow a filter, applying it as a filter",
                    self.table
                );
                self.where_(predicate)
            }
        }
    }

    /// Stable sort on one field.
    pub fn order_by(self, field_name: &str, order: SortOrder) -> Self {
        self.push(QueryOp::OrderBy(vec![SortKey::new(field_name, order)]))
    }

    /// Stable sort on several fields, the first one most significant.
    pub fn order_by_keys(self, keys: Vec<SortKey>) -> Self {
        self.push(QueryOp::OrderBy(keys))
    }

    pub fn limit(self, n: usize) -> Self {
        self.push(QueryOp::Limit(n))
    }

    pub fn offset(self, n: usize) -> Self {
        self.push(QueryOp::Offset(n))
    }

    /// 1-indexed page of `size` elements.
    pub fn page(self, page: usize, size: usize) -> Self {
        self.push(QueryOp::Page { page, size })
    }

    pub fn reverse(self) -> Self {
        self.push(QueryOp::Reverse)
    }

    /// Turns elements into `{key, values}` groups keyed by `field_name`.
    pub fn group_by(self, field_name: &str) -> Self {
        self.push(QueryOp::GroupBy(field_name.to_string()))
    }

    /// Rewrites every element with `f`. Disables memoization for this pipeline.
    pub fn modify<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Value) + Send + Sync + 'static,
    {
        self.mutation_version += 1;
        self.invalidate();
        let f: ModifyFn = Arc::new(f);
        self.push(QueryOp::Modify {
            id: next_closure_id(),
            f,
        })
    }

    /// Fuzzy search over every string field with the default threshold.
    pub fn search(self, query: &str) -> Self {
        self.search_with(query, &[], DEFAULT_SEARCH_THRESHOLD)
    }

    /// Fuzzy search over `fields` (all string fields when empty).
    pub fn search_with(self, query: &str, fields: &[&str], threshold: f64) -> Self {
        self.push(QueryOp::Search {
            query: query.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            threshold,
        })
    }

    /// Drops every memoized result of this builder.
    pub fn invalidate(&self) {
        if let Some(cache) = self.memo.lock().as_mut() {
            cache.clear();
        }
    }

    fn evaluate(&self) -> DepositResult<Vec<Value>> {
        let memoizable = !self.steps.iter().any(QueryOp::is_mutation);
        let memo_key = format!("{}@{}", self.signature(), self.mutation_version);

        if memoizable {
            let hit = self
                .memo
                .lock()
                .as_mut()
                .and_then(|cache| cache.get(&memo_key).cloned());
            if let Some(hit) = hit {
                log::trace!("Memo hit for {}", memo_key);
                return Ok(hit);
            }
        }

        let mut data = self.adapter.get_all(&self.table)?;
        for step in &self.steps {
            data = step.apply(data);
        }

        if memoizable {
            if let Some(cache) = self.memo.lock().as_mut() {
                cache.put(memo_key, data.clone());
            }
        }
        Ok(data)
    }

    pub fn to_vec(&self) -> DepositResult<Vec<Value>> {
        self.evaluate()
    }

    /// Deserializes every element into `T`.
    pub fn to_vec_of<T: DeserializeOwned>(&self) -> DepositResult<Vec<T>> {
        self.evaluate()?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    pub fn count(&self) -> DepositResult<usize> {
        Ok(self.evaluate()?.len())
    }

    pub fn first(&self) -> DepositResult<Option<Value>> {
        Ok(self.evaluate()?.into_iter().next())
    }

    pub fn last(&self) -> DepositResult<Option<Value>> {
        Ok(self.evaluate()?.pop())
    }

    /// Sum of `field_name`, non-numeric values count as 0.
    pub fn sum(&self, field_name: &str) -> DepositResult<f64> {
        Ok(self
            .evaluate()?
            .iter()
            .map(|record| numeric_or_zero(field_value(record, field_name)))
            .sum())
    }

    /// Mean of `field_name`, non-numeric values count as 0. 0 for an empty result.
    pub fn average(&self, field_name: &str) -> DepositResult<f64> {
        let data = self.evaluate()?;
        if data.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = data
            .iter()
            .map(|record| numeric_or_zero(field_value(record, field_name)))
            .sum();
        Ok(total / data.len() as f64)
    }

    /// Element with the smallest `field_name`, the first one on ties.
    pub fn min(&self, field_name: &str) -> DepositResult<Option<Value>> {
        let data = self.evaluate()?;
        Ok(min_by(&data, |record| read(record, field_name)).cloned())
    }

    /// Element with the largest `field_name`, the first one on ties.
    pub fn max(&self, field_name: &str) -> DepositResult<Option<Value>> {
        let data = self.evaluate()?;
        Ok(max_by(&data, |record| read(record, field_name)).cloned())
    }

    /// Runs the pipeline and groups the result by `field_name`.
    pub fn to_grouped(&self, field_name: &str) -> DepositResult<Vec<Group>> {
        let data = self.evaluate()?;
        Ok(crate::common::group_by(data, |record| read(record, field_name))
            .into_values()
            .collect())
    }
}

fn read(record: &Value, field_name: &str) -> Value {
    field_value(record, field_name)
        .cloned()
        .unwrap_or(Value::Null)
}
