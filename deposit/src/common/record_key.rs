use crate::errors::{DepositError, DepositResult, ErrorKind};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Primary-key or index-key value of a record.
///
/// Only numbers and strings can identify a record. Keys are totally ordered with every
/// number sorting before every string, which is the order both backends scan in.
#[derive(Debug, Clone)]
pub enum RecordKey {
    Number(f64),
    Text(String),
}

impl RecordKey {
    /// Extracts a key from a JSON value.
    ///
    /// Fails with [`ErrorKind::InvalidKey`] for anything other than a finite number or a string.
    pub fn from_value(value: &Value) -> DepositResult<RecordKey> {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => Ok(RecordKey::Number(f)),
                _ => Err(DepositError::new(
                    &format!("Key {} is not a finite number", n),
                    ErrorKind::InvalidKey,
                )),
            },
            Value::String(s) => Ok(RecordKey::Text(s.clone())),
            other => Err(DepositError::new(
                &format!("Key must be a number or a string, found {}", other),
                ErrorKind::InvalidKey,
            )),
        }
    }

    /// Returns the key as a JSON value, integers stay integers.
    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Number(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Value::from(*f as i64)
                } else {
                    Value::from(*f)
                }
            }
            RecordKey::Text(s) => Value::String(s.clone()),
        }
    }

    #[inline]
    fn normalized(f: f64) -> f64 {
        // -0.0 and 0.0 identify the same record
        if f == 0.0 {
            0.0
        } else {
            f
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Number(_) => write!(f, "{}", self.to_value()),
            RecordKey::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RecordKey::Number(a), RecordKey::Number(b)) => {
                RecordKey::normalized(*a).total_cmp(&RecordKey::normalized(*b))
            }
            (RecordKey::Number(_), RecordKey::Text(_)) => Ordering::Less,
            (RecordKey::Text(_), RecordKey::Number(_)) => Ordering::Greater,
            (RecordKey::Text(a), RecordKey::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RecordKey {}

impl Hash for RecordKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            RecordKey::Number(f) => {
                0u8.hash(state);
                RecordKey::normalized(*f).to_bits().hash(state);
            }
            RecordKey::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

macro_rules! key_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RecordKey {
                fn from(value: $t) -> Self {
                    RecordKey::Number(value as f64)
                }
            }
        )*
    };
}

key_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        RecordKey::Text(value)
    }
}

impl From<&String> for RecordKey {
    fn from(value: &String) -> Self {
        RecordKey::Text(value.clone())
    }
}

impl From<&RecordKey> for RecordKey {
    fn from(value: &RecordKey) -> Self {
        value.clone()
    }
}
