//! Helpers over raw store documents: freshness ranking and nested lookup.

use crate::models::value_text;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Keys consulted, in order, for a document's freshness.
const FRESHNESS_KEYS: [&str; 2] = ["updated_at", "created_at"];

/// Best-effort ISO-8601 parse. Naive timestamps are read as UTC.
pub fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    let s = value_text(v)?;
    let s = s.as_str();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `updated_at`, else `created_at`; `None` when neither parses.
pub fn freshness(doc: &Value) -> Option<DateTime<Utc>> {
    FRESHNESS_KEYS
        .iter()
        .find_map(|k| doc.get(*k).and_then(parse_timestamp))
}

/// The item with the greatest key. Ties go to the earliest item, so the
/// result is stable with respect to retrieval order.
pub fn pick_latest<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Option<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut best: Option<(K, T)> = None;
    for item in items {
        let k = key(&item);
        let newer = match &best {
            Some((best_key, _)) => k > *best_key,
            None => true,
        };
        if newer {
            best = Some((k, item));
        }
    }
    best.map(|(_, item)| item)
}

/// Pick the current document among candidates for one company.
/// Unparseable timestamps rank below every valid one.
pub fn select_current(candidates: Vec<Value>) -> Option<Value> {
    pick_latest(candidates, freshness)
}

/// First occurrence of `key`, searching the current object before descending
/// into nested objects in document order. A key present with `null` ends the
/// search for that key.
pub fn deep_get<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    let map = doc.as_object()?;
    if let Some(v) = map.get(key) {
        return (!v.is_null()).then_some(v);
    }
    map.values()
        .filter(|v| v.is_object())
        .find_map(|v| deep_get(v, key))
}

/// First alias that [`deep_get`] finds.
pub fn deep_get_any<'a>(doc: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|k| deep_get(doc, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&json!("2025-07-01T10:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2025-07-01T15:30:00+05:30")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2025-07-01T10:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2025-07-01 10:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!({"$date": "2025-07-01T10:00:00.000Z"})), Some(expected));
        assert_eq!(
            parse_timestamp(&json!("2025-07-01")),
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn test_freshness_falls_back_to_created_at() {
        let doc = json!({"updated_at": "garbage", "created_at": "2025-01-02T00:00:00Z"});
        assert_eq!(
            freshness(&doc),
            Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(freshness(&json!({})), None);
    }

    #[test]
    fn test_select_current_prefers_latest() {
        let docs = vec![
            json!({"id": 1, "updated_at": "2025-05-01T00:00:00Z"}),
            json!({"id": 2, "updated_at": "2025-07-01T00:00:00Z"}),
            json!({"id": 3, "created_at": "2025-06-01T00:00:00Z"}),
        ];
        assert_eq!(select_current(docs).unwrap()["id"], 2);
    }

    #[test]
    fn test_unparseable_never_outranks_valid() {
        let docs = vec![
            json!({"id": 1, "updated_at": "not a date"}),
            json!({"id": 2, "updated_at": "1999-01-01T00:00:00Z"}),
            json!({"id": 3}),
        ];
        assert_eq!(select_current(docs).unwrap()["id"], 2);
    }

    #[test]
    fn test_selection_is_deterministic_on_ties() {
        let docs = vec![
            json!({"id": 1, "updated_at": "2025-07-01T00:00:00Z"}),
            json!({"id": 2, "updated_at": "2025-07-01T00:00:00Z"}),
        ];
        for _ in 0..3 {
            assert_eq!(select_current(docs.clone()).unwrap()["id"], 1);
        }
        let undated = vec![json!({"id": "a"}), json!({"id": "b"})];
        assert_eq!(select_current(undated).unwrap()["id"], "a");
    }

    #[test]
    fn test_select_current_empty() {
        assert_eq!(select_current(vec![]), None);
    }

    #[test]
    fn test_deep_get_order() {
        let doc = json!({
            "meta": {"sales": 10, "inner": {"ebitda": 3}},
            "ebitda": null,
            "pat": 4,
        });
        assert_eq!(deep_get(&doc, "sales"), Some(&json!(10)));
        assert_eq!(deep_get(&doc, "pat"), Some(&json!(4)));
        // present-but-null at the top stops the search
        assert_eq!(deep_get(&doc, "ebitda"), None);
        assert_eq!(deep_get_any(&doc, &["revenue", "sales"]), Some(&json!(10)));
    }
}
