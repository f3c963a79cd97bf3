use serde_json::Value;

/// Resolves a dotted field path (`address.city`) inside a record.
///
/// Returns `None` when any segment is missing or an intermediate value is not an object.
/// A path without dots is a plain top-level lookup.
pub fn field_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return record.as_object().and_then(|obj| obj.get(path));
    }

    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Coerces a field to a number, anything non-numeric counts as zero.
#[inline]
pub fn numeric_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}
