use crate::common::{compare_values, field_value, type_rank};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use itertools::Itertools;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

static NEXT_CLOSURE_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out ids that stand in for closures in pipeline signatures.
pub(crate) fn next_closure_id() -> u64 {
    NEXT_CLOSURE_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Comparison operator of a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
        }
    }
}

pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A record filter.
///
/// Field lookups accept dotted paths and a missing field reads as `null`. Ordered
/// comparisons only hold between values of the same JSON type, so `price > 10` never
/// matches a string price. Equality treats `1` and `1.0` as equal.
///
/// Build predicates with [`field`], [`Predicate::custom`] and the `and`/`or`/`!`
/// combinators.
#[derive(Clone)]
pub enum Predicate {
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    Between {
        field: String,
        lower: Bound<Value>,
        upper: Bound<Value>,
    },
    StartsWith {
        field: String,
        prefix: String,
    },
    AnyOf {
        field: String,
        values: Vec<Value>,
    },
    Matches {
        field: String,
        regex: Regex,
    },
    Custom {
        id: u64,
        f: PredicateFn,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Wraps an arbitrary test. Each call gets a distinct identity in signatures.
    pub fn custom<F>(f: F) -> Predicate
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom {
            id: next_closure_id(),
            f: Arc::new(f),
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut all) => {
                all.push(other);
                Predicate::And(all)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut any) => {
                any.push(other);
                Predicate::Or(any)
            }
            this => Predicate::Or(vec![this, other]),
        }
    }

    pub fn evaluate(&self, record: &Value) -> bool {
        match self {
            Predicate::Compare { field, op, value } => {
                let actual = read(record, field);
                match op {
                    Comparison::Eq => values_equal(actual, value),
                    Comparison::Ne => !values_equal(actual, value),
                    _ => {
                        type_rank(actual) == type_rank(value)
                            && op.accepts(compare_values(actual, value))
                    }
                }
            }
            Predicate::Between {
                field,
                lower,
                upper,
            } => {
                let actual = read(record, field);
                within_lower(actual, lower) && within_upper(actual, upper)
            }
            Predicate::StartsWith { field, prefix } => read(record, field)
                .as_str()
                .map(|text| text.starts_with(prefix.as_str()))
                .unwrap_or(false),
            Predicate::AnyOf { field, values } => {
                let actual = read(record, field);
                values.iter().any(|value| values_equal(actual, value))
            }
            Predicate::Matches { field, regex } => read(record, field)
                .as_str()
                .map(|text| regex.is_match(text))
                .unwrap_or(false),
            Predicate::Custom { f, .. } => f(record),
            Predicate::Not(inner) => !inner.evaluate(record),
            Predicate::And(all) => all.iter().all(|p| p.evaluate(record)),
            Predicate::Or(any) => any.iter().any(|p| p.evaluate(record)),
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            Predicate::Between {
                field,
                lower,
                upper,
            } => {
                let lower = match lower {
                    Bound::Included(v) => format!("[{}", v),
                    Bound::Excluded(v) => format!("({}", v),
                    Bound::Unbounded => "(*".to_string(),
                };
                let upper = match upper {
                    Bound::Included(v) => format!("{}]", v),
                    Bound::Excluded(v) => format!("{})", v),
                    Bound::Unbounded => "*)".to_string(),
                };
                write!(f, "{} in {}, {}", field, lower, upper)
            }
            Predicate::StartsWith { field, prefix } => {
                write!(f, "{} starts with {}", field, Value::from(prefix.as_str()))
            }
            Predicate::AnyOf { field, values } => {
                write!(f, "{} any of [{}]", field, values.iter().join(", "))
            }
            Predicate::Matches { field, regex } => write!(f, "{} ~ /{}/", field, regex.as_str()),
            Predicate::Custom { id, .. } => write!(f, "fn#{}", id),
            Predicate::Not(inner) => write!(f, "!({})", inner),
            Predicate::And(all) => write!(f, "({})", all.iter().join(" && ")),
            Predicate::Or(any) => write!(f, "({})", any.iter().join(" || ")),
        }
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self)
    }
}

#[inline]
fn read<'a>(record: &'a Value, field: &str) -> &'a Value {
    field_value(record, field).unwrap_or(&Value::Null)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b) && compare_values(a, b) == Ordering::Equal
}

fn within_lower(actual: &Value, lower: &Bound<Value>) -> bool {
    match lower {
        Bound::Included(bound) => {
            type_rank(actual) == type_rank(bound) && compare_values(actual, bound) != Ordering::Less
        }
        Bound::Excluded(bound) => {
            type_rank(actual) == type_rank(bound)
                && compare_values(actual, bound) == Ordering::Greater
        }
        Bound::Unbounded => !actual.is_null(),
    }
}

fn within_upper(actual: &Value, upper: &Bound<Value>) -> bool {
    match upper {
        Bound::Included(bound) => {
            type_rank(actual) == type_rank(bound)
                && compare_values(actual, bound) != Ordering::Greater
        }
        Bound::Excluded(bound) => {
            type_rank(actual) == type_rank(bound) && compare_values(actual, bound) == Ordering::Less
        }
        Bound::Unbounded => !actual.is_null(),
    }
}

/// Starts a predicate over `name`, which may be a dotted path.
///
/// ```rust,ignore
/// use deposit::query::field;
///
/// let adults = field("age").gte(18).and(field("country").eq("NO"));
/// ```
pub fn field(name: &str) -> FieldPredicate {
    FieldPredicate {
        field: name.to_string(),
    }
}

/// Fluent builder returned by [`field`].
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    field: String,
}

impl FieldPredicate {
    fn compare<V: Into<Value>>(self, op: Comparison, value: V) -> Predicate {
        Predicate::Compare {
            field: self.field,
            op,
            value: value.into(),
        }
    }

    pub fn eq<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(Comparison::Eq, value)
    }

    pub fn ne<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(Comparison::Ne, value)
    }

    pub fn gt<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(Comparison::Gt, value)
    }

    pub fn gte<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(Comparison::Gte, value)
    }

    pub fn lt<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(Comparison::Lt, value)
    }

    pub fn lte<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(Comparison::Lte, value)
    }

    /// Inclusive range `lower <= field <= upper`.
    pub fn between<L: Into<Value>, U: Into<Value>>(self, lower: L, upper: U) -> Predicate {
        self.between_with(Bound::Included(lower.into()), Bound::Included(upper.into()))
    }

    pub fn between_with(self, lower: Bound<Value>, upper: Bound<Value>) -> Predicate {
        Predicate::Between {
            field: self.field,
            lower,
            upper,
        }
    }

    pub fn starts_with(self, prefix: &str) -> Predicate {
        Predicate::StartsWith {
            field: self.field,
            prefix: prefix.to_string(),
        }
    }

    pub fn any_of<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::AnyOf {
            field: self.field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches string fields against a regular expression.
    pub fn matches(self, pattern: &str) -> DepositResult<Predicate> {
        let regex = Regex::new(pattern).map_err(|err| {
            log::error!("Invalid pattern {}: {}", pattern, err);
            DepositError::new(
                &format!("Invalid pattern {}: {}", pattern, err),
                ErrorKind::InvalidOperation,
            )
        })?;
        Ok(Predicate::Matches {
            field: self.field,
            regex,
        })
    }
}
