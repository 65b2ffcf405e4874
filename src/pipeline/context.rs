use crate::input_format::Record;
use crate::pipeline::extra::Extra;
use crate::pipeline::stages::StageSpec;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// A flat output row, keyed by CSV column.
pub type Row = Map<String, Value>;

/// A record that passed every stage check, ready for projection or merging
#[derive(Debug, Clone)]
pub struct Accepted<'r> {
    pub record: &'r Record,
    pub extra: Extra,
    /// Top-level `user_id`, stringified and trimmed
    pub user_id: String,
    /// Validated (trimmed) values of the stage's required extra fields
    pub checked: IndexMap<&'static str, String>,
}

impl<'r> Accepted<'r> {
    /// Top-level field, or an empty string when missing.
    pub fn top_field(&self, key: &str) -> Value {
        self.record
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    /// Field from the decoded extra payload, or an empty string when missing.
    pub fn extra_field(&self, key: &str) -> Value {
        self.extra
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    /// Validated value of a required check.
    pub fn checked(&self, key: &str) -> Value {
        Value::String(self.checked.get(key).cloned().unwrap_or_default())
    }
}

/// Why a record did not make it into the stage output
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Event name belongs to another stage
    OtherEvent,
    /// Outside the requested date range
    OutOfRange,
    /// Blank top-level `user_id` on a stage keyed by user
    BlankUserId,
    /// Required extra field absent
    Missing(&'static str),
    /// Required extra field present but blank
    Empty(&'static str),
    /// Required extra field with the wrong shape
    InvalidFormat { key: &'static str, value: String },
}

/// Result of running one record through a stage filter
#[derive(Debug)]
pub enum ProcessResult<'r> {
    Accept(Accepted<'r>),
    Skip(SkipReason),
}

/// Diagnostic counters for one extra-field check
#[derive(Debug, Default, Clone)]
pub struct CheckCounters {
    pub missing: usize,
    pub empty: usize,
    pub invalid_format: usize,
    pub nonempty: usize,
    /// Rejected values, first-seen order
    pub invalid_values: IndexMap<String, usize>,
}

/// Per-stage filter counters. A rejected record is attributed to the first
/// check it failed and nothing else.
#[derive(Debug, Default, Clone)]
pub struct FilterCounters {
    pub date_filtered_out: usize,
    pub user_id_blank: usize,
    pub kept: usize,
    pub checks: IndexMap<&'static str, CheckCounters>,
}

impl FilterCounters {
    pub fn for_stage(stage: &StageSpec) -> Self {
        let checks = stage
            .checks
            .iter()
            .map(|check| (check.key, CheckCounters::default()))
            .collect();

        FilterCounters {
            checks,
            ..FilterCounters::default()
        }
    }

    pub fn check_mut(&mut self, key: &'static str) -> &mut CheckCounters {
        self.checks.entry(key).or_default()
    }

    pub fn check(&self, key: &str) -> Option<&CheckCounters> {
        self.checks.get(key)
    }
}

/// Counts over the whole input, before any stage filtering
#[derive(Debug, Default, Clone)]
pub struct RawStats {
    pub total_rows: usize,
    /// Histogram of the top-level `event` field, first-seen order
    pub event_counts: IndexMap<String, usize>,
}

impl RawStats {
    pub fn tally(records: &[Record]) -> Self {
        let mut event_counts = IndexMap::new();
        for record in records {
            *event_counts
                .entry(crate::summary::histogram_key(record.get("event")))
                .or_insert(0) += 1;
        }

        RawStats {
            total_rows: records.len(),
            event_counts,
        }
    }

    pub fn event_rows(&self, event: &str) -> usize {
        self.event_counts.get(event).copied().unwrap_or(0)
    }
}
