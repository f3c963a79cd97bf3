use crate::common::field_value;
use serde_json::Value;

/// Levenshtein edit distance over Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Similarity in `[0, 1]` between a query and one candidate text.
///
/// A case-insensitive substring hit scores `1.0`. Otherwise the best normalized edit
/// similarity against the whole text or any of its words is used.
pub fn similarity(query: &str, text: &str) -> f64 {
    let query = query.to_lowercase();
    let text = text.to_lowercase();
    if query.is_empty() || text.contains(&query) {
        return 1.0;
    }

    let ratio = |candidate: &str| {
        let longest = query.chars().count().max(candidate.chars().count());
        if longest == 0 {
            return 1.0;
        }
        1.0 - edit_distance(&query, candidate) as f64 / longest as f64
    };

    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(ratio)
        .fold(ratio(&text), f64::max)
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

/// Scores a record against a query over the given fields, or every string it holds
/// when `fields` is empty.
pub fn record_score(record: &Value, query: &str, fields: &[String]) -> f64 {
    let mut texts = Vec::new();
    if fields.is_empty() {
        collect_strings(record, &mut texts);
    } else {
        for field in fields {
            if let Some(value) = field_value(record, field) {
                collect_strings(value, &mut texts);
            }
        }
    }

    texts
        .into_iter()
        .map(|text| similarity(query, text))
        .fold(0.0, f64::max)
}

/// Fuzzy text search: keeps records scoring at least `threshold`, best matches first.
///
/// Records with equal scores keep their input order.
pub fn search(data: Vec<Value>, query: &str, fields: &[String], threshold: f64) -> Vec<Value> {
    if query.trim().is_empty() {
        return data;
    }

    let mut scored: Vec<(f64, Value)> = data
        .into_iter()
        .map(|record| (record_score(&record, query, fields), record))
        .filter(|(score, _)| *score >= threshold)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, record)| record).collect()
}
