// src/pipeline/dedupe.rs
use crate::pipeline::context::Row;
use crate::pipeline::fields::cell_text;
use crate::pipeline::temporal::{parse_tm, tm_sort_key};
use chrono::NaiveDateTime;
use indexmap::IndexMap;

/// A projected row together with its parsed timestamp
#[derive(Debug, Clone)]
pub struct FilteredRow {
    pub row: Row,
    pub tm: Option<NaiveDateTime>,
}

impl FilteredRow {
    pub fn new(row: Row) -> Self {
        let tm = parse_tm(row.get("tm"));
        FilteredRow { row, tm }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupeOutcome {
    /// One row per key, in the order keys were first kept
    pub rows: Vec<Row>,
    pub dropped: usize,
}

/// Keep the earliest row for every distinct `key` value.
///
/// Rows are stably sorted by timestamp (unparseable last), so equal
/// timestamps keep their input order and the first one wins.
pub fn keep_earliest(mut rows: Vec<FilteredRow>, key: &str) -> DedupeOutcome {
    rows.sort_by_key(|filtered| tm_sort_key(filtered.tm));

    let mut kept: IndexMap<String, Row> = IndexMap::with_capacity(rows.len());
    let mut dropped = 0;

    for filtered in rows {
        let value = filtered.row.get(key).map(cell_text).unwrap_or_default();
        if kept.contains_key(&value) {
            dropped += 1;
            continue;
        }
        kept.insert(value, filtered.row);
    }

    DedupeOutcome {
        rows: kept.into_values().collect(),
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(key: &str, tm: &str, tag: &str) -> FilteredRow {
        let value = json!({"invitationCode": key, "tm": tm, "tag": tag});
        FilteredRow::new(value.as_object().cloned().unwrap())
    }

    fn tags(outcome: &DedupeOutcome) -> Vec<&str> {
        outcome
            .rows
            .iter()
            .map(|r| r["tag"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_earliest_timestamp_wins() {
        let outcome = keep_earliest(
            vec![
                row("X", "2024-01-02 00:00:00", "later"),
                row("X", "2024-01-01 00:00:00", "earlier"),
            ],
            "invitationCode",
        );
        assert_eq!(tags(&outcome), vec!["earlier"]);
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let outcome = keep_earliest(
            vec![
                row("X", "2024-01-01 00:00:00", "first"),
                row("X", "2024-01-01 00:00:00", "second"),
            ],
            "invitationCode",
        );
        assert_eq!(tags(&outcome), vec!["first"]);
    }

    #[test]
    fn test_unparseable_timestamps_sort_last() {
        let outcome = keep_earliest(
            vec![
                row("X", "garbage", "bad"),
                row("X", "2030-01-01 00:00:00", "good"),
                row("Y", "", "y-first"),
                row("Y", "nope", "y-second"),
            ],
            "invitationCode",
        );
        // Y has no parseable timestamp at all, so its first row survives
        assert_eq!(tags(&outcome), vec!["good", "y-first"]);
        assert_eq!(outcome.dropped, 2);
    }

    #[test]
    fn test_output_follows_first_kept_order() {
        let outcome = keep_earliest(
            vec![
                row("B", "2024-01-03 00:00:00", "b"),
                row("A", "2024-01-02 00:00:00", "a"),
                row("C", "2024-01-01 00:00:00", "c"),
            ],
            "invitationCode",
        );
        assert_eq!(tags(&outcome), vec!["c", "a", "b"]);
        assert_eq!(outcome.dropped, 0);
    }
}
