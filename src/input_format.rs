// src/input_format.rs - Record source for event-log exports

use crate::error::{FunnelError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One raw event-log record: an untyped JSON object.
pub type Record = serde_json::Map<String, Value>;

/// Keys searched, in order, when an export wraps its records in an object.
pub const WRAPPER_KEYS: &[&str] = &["data", "rows", "records", "items", "list"];

/// How the records were found in the input document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Top-level JSON array
    Array,
    /// Object wrapping the array under one of [`WRAPPER_KEYS`]
    Wrapped(&'static str),
    /// One JSON value per line
    JsonLines,
}

impl std::fmt::Display for DocumentShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentShape::Array => write!(f, "array"),
            DocumentShape::Wrapped(key) => write!(f, "object wrapping '{}'", key),
            DocumentShape::JsonLines => write!(f, "JSON lines"),
        }
    }
}

#[derive(Debug)]
pub struct LoadedRecords {
    pub records: Vec<Record>,
    pub shape: DocumentShape,
}

/// Read and decode an export file into records.
pub fn load_records(path: &Path) -> Result<LoadedRecords> {
    let raw = fs::read(path).map_err(|source| FunnelError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let loaded = parse_records(&raw)?;
    debug!(
        path = %path.display(),
        records = loaded.records.len(),
        shape = %loaded.shape,
        "loaded input"
    );
    Ok(loaded)
}

/// UTF-8 byte-order mark some Windows exporters prepend.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Decode raw bytes: whole-document JSON first, JSON lines as a fallback.
pub fn parse_records(raw: &[u8]) -> Result<LoadedRecords> {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    match serde_json::from_slice::<Value>(raw) {
        Ok(document) => extract_records(document),
        Err(_) => {
            let items = parse_json_lines(raw)?;
            Ok(LoadedRecords {
                records: objects_only(items),
                shape: DocumentShape::JsonLines,
            })
        }
    }
}

fn parse_json_lines(raw: &[u8]) -> Result<Vec<Value>> {
    let mut items = Vec::new();

    for (index, line) in split_lines(raw).into_iter().enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        // A single bad line fails the whole load
        let value = serde_json::from_slice(line).map_err(|source| FunnelError::Json {
            line: index + 1,
            source,
        })?;
        items.push(value);
    }

    Ok(items)
}

/// Split on `\n`, `\r\n` or a lone `\r`.
fn split_lines(raw: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'\n' => {
                lines.push(&raw[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&raw[start..i]);
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < raw.len() {
        lines.push(&raw[start..]);
    }
    lines
}

fn extract_records(document: Value) -> Result<LoadedRecords> {
    match document {
        Value::Array(items) => Ok(LoadedRecords {
            records: objects_only(items),
            shape: DocumentShape::Array,
        }),
        Value::Object(mut wrapper) => {
            for &key in WRAPPER_KEYS {
                if let Some(Value::Array(items)) = wrapper.get_mut(key) {
                    return Ok(LoadedRecords {
                        records: objects_only(std::mem::take(items)),
                        shape: DocumentShape::Wrapped(key),
                    });
                }
            }
            Err(FunnelError::UnsupportedFormat)
        }
        _ => Err(FunnelError::UnsupportedFormat),
    }
}

/// Keep object elements; anything else in the list is silently dropped.
fn objects_only(items: Vec<Value>) -> Vec<Record> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_array() {
        let raw = br#"[{"event":"a"}, 5, "x", {"event":"b"}, null]"#;
        let loaded = parse_records(raw).unwrap();

        assert_eq!(loaded.shape, DocumentShape::Array);
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0]["event"], "a");
        assert_eq!(loaded.records[1]["event"], "b");
    }

    #[test]
    fn test_wrapped_array_uses_first_list_key() {
        // "data" is not a list, so "rows" wins over the later "items"
        let raw = br#"{"data": {"nope": 1}, "items": [{"event":"late"}], "rows": [{"event":"r"}]}"#;
        let loaded = parse_records(raw).unwrap();

        assert_eq!(loaded.shape, DocumentShape::Wrapped("rows"));
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0]["event"], "r");
    }

    #[test]
    fn test_json_lines_fallback() {
        let raw = b"{\"event\":\"a\"}\n\n   \r\n{\"event\":\"b\"}\r\n[1,2]\n";
        let loaded = parse_records(raw).unwrap();

        assert_eq!(loaded.shape, DocumentShape::JsonLines);
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[1]["event"], "b");
    }

    #[test]
    fn test_json_lines_bad_line_is_fatal() {
        let raw = b"{\"event\":\"a\"}\n{broken\n{\"event\":\"c\"}\n";
        match parse_records(raw) {
            Err(FunnelError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected JSON line error, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_bom_is_ignored() {
        let raw = b"\xef\xbb\xbf[{\"event\":\"guide_bind\",\"user_id\":\"u1\"}]";
        let loaded = parse_records(raw).unwrap();

        assert_eq!(loaded.shape, DocumentShape::Array);
        assert_eq!(loaded.records[0]["user_id"], "u1");

        let lines = parse_records(b"\xef\xbb\xbf{\"event\":\"a\"}\n{\"event\":\"b\"}\n").unwrap();
        assert_eq!(lines.shape, DocumentShape::JsonLines);
        assert_eq!(lines.records.len(), 2);
    }

    #[test]
    fn test_json_lines_with_bare_carriage_returns() {
        let raw = b"{\"event\":\"a\"}\r{\"event\":\"b\"}\r\n{\"event\":\"c\"}";
        let loaded = parse_records(raw).unwrap();

        assert_eq!(loaded.records.len(), 3);
        assert_eq!(loaded.records[2]["event"], "c");

        match parse_records(b"{\"event\":\"a\"}\r\n{\"event\":\"b\"}\r{oops\r") {
            Err(FunnelError::Json { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected JSON line error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_shapes() {
        assert!(matches!(
            parse_records(br#"{"payload": [{"event":"a"}]}"#),
            Err(FunnelError::UnsupportedFormat)
        ));
        assert!(matches!(
            parse_records(b"42"),
            Err(FunnelError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_empty_input_is_empty_record_list() {
        let loaded = parse_records(b"").unwrap();
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.shape, DocumentShape::JsonLines);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = load_records(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(FunnelError::Read { .. })));
    }
}
