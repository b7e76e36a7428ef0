//! Test-Value Synthesizer: plausible JSON values for request fields.

use serde_json::{json, Map, Value};

/// Pick a value for `field` by case-insensitive substring match.
///
/// Rules are checked in priority order, so `user_id` yields `1` and
/// `email_count` yields the email string. Total and deterministic.
pub fn synthesize(field: &str) -> Value {
    let f = field.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| f.contains(n));

    if has(&["id"]) {
        json!(1)
    } else if has(&["email"]) {
        json!("test@example.com")
    } else if has(&["password"]) {
        json!("testpass123")
    } else if has(&["name", "title"]) {
        json!("Test Item")
    } else if has(&["content", "text", "description"]) {
        json!("Test content here")
    } else if has(&["price", "amount"]) {
        json!(100)
    } else if has(&["quantity", "count"]) {
        json!(5)
    } else if has(&["date"]) {
        json!("2024-01-01")
    } else if has(&["url", "link"]) {
        json!("https://example.com")
    } else if has(&["done", "completed", "active"]) {
        json!(true)
    } else {
        json!("test")
    }
}

/// JSON object with one synthesized value per field. Keys come out sorted.
pub fn synthesize_body<I, S>(fields: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entries: Vec<(String, Value)> = fields
        .into_iter()
        .map(|f| (f.as_ref().to_string(), synthesize(f.as_ref())))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.dedup_by(|a, b| a.0 == b.0);
    Value::Object(entries.into_iter().collect::<Map<String, Value>>())
}
