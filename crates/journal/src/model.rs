//! `HistoryEntry` and the field-size/JSON-size caps applied to it before
//! anything is queued for persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const TOOL_TYPE_MAX: usize = 32;
pub const TARGET_MAX: usize = 256;
pub const ERROR_MAX: usize = 2048;
pub const CONNECTION_ID_MAX: usize = 128;
pub const NOTES_MAX: usize = 4096;
pub const JSON_MAX_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp_utc: DateTime<Utc>,
    pub tool_type: String,
    pub target: String,
    pub input_json: Option<Value>,
    pub result_json: Option<Value>,
    pub success: bool,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub connection_id: Option<String>,
    pub tags_json: Option<Value>,
    pub notes: Option<String>,
    pub updated_utc: DateTime<Utc>,
}

/// Truncates `s` to at most `max` bytes on a UTF-8 char boundary.
fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Replaces `value` with the `{"_truncated": true}` sentinel if its
/// serialized form exceeds `JSON_MAX_BYTES`.
pub fn cap_json(value: Option<Value>) -> Option<Value> {
    value.map(|v| match serde_json::to_string(&v) {
        Ok(s) if s.len() <= JSON_MAX_BYTES => v,
        Ok(_) => serde_json::json!({"_truncated": true}),
        Err(_) => serde_json::json!({"_error": "serialization_failed"}),
    })
}

/// Attempts to serialize an arbitrary value into a capped JSON payload.
/// Values that can't even reach `serde_json::Value` get the
/// `{"_error":"serialization_failed"}` sentinel instead of failing the call.
pub fn to_capped_json<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(v) => cap_json(Some(v)),
        Err(_) => Some(serde_json::json!({"_error": "serialization_failed"})),
    }
}

#[allow(clippy::too_many_arguments)]
impl HistoryEntry {
    pub fn new(
        id: Uuid,
        tool_type: &str,
        target: &str,
        input_json: Option<Value>,
        result_json: Option<Value>,
        success: bool,
        duration_ms: u64,
        error_message: Option<String>,
        connection_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            timestamp_utc: now,
            tool_type: truncate_str(tool_type, TOOL_TYPE_MAX),
            target: truncate_str(target, TARGET_MAX),
            input_json: cap_json(input_json),
            result_json: cap_json(result_json),
            success,
            duration_ms,
            error_message: error_message.map(|e| truncate_str(&e, ERROR_MAX)),
            connection_id: connection_id.map(|c| truncate_str(&c, CONNECTION_ID_MAX)),
            tags_json: None,
            notes: None,
            updated_utc: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub tool_types: Vec<String>,
    pub success: Option<bool>,
    /// Case-insensitive substring match over target/tool_type/error_message.
    pub search: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub sort: SortField,
    pub descending: bool,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Timestamp,
    Duration,
    Tool,
    Target,
    Status,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_respects_char_boundaries() {
        let s = "a".repeat(10) + "é";
        let truncated = truncate_str(&s, 10);
        assert!(truncated.len() <= 10);
        assert!(String::from_utf8(truncated.into_bytes()).is_ok());
    }

    #[test]
    fn oversize_json_is_sentineled() {
        let big = Value::String("x".repeat(JSON_MAX_BYTES + 10));
        let capped = cap_json(Some(big)).unwrap();
        assert_eq!(capped, serde_json::json!({"_truncated": true}));
    }

    #[test]
    fn small_json_is_preserved() {
        let small = serde_json::json!({"a": 1});
        let capped = cap_json(Some(small.clone())).unwrap();
        assert_eq!(capped, small);
    }

    #[test]
    fn field_truncation_applied_on_construction() {
        let entry = HistoryEntry::new(
            Uuid::new_v4(),
            &"x".repeat(64),
            &"y".repeat(512),
            None,
            None,
            true,
            10,
            Some("e".repeat(4096)),
            Some("c".repeat(256)),
        );
        assert_eq!(entry.tool_type.len(), TOOL_TYPE_MAX);
        assert_eq!(entry.target.len(), TARGET_MAX);
        assert_eq!(entry.error_message.unwrap().len(), ERROR_MAX);
        assert_eq!(entry.connection_id.unwrap().len(), CONNECTION_ID_MAX);
    }
}
