// src/pipeline/temporal.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

/// Record timestamp layout (`tm` field).
pub const TM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layouts accepted for date-range bounds.
pub const DATE_BOUND_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a record timestamp. Anything that is not a `YYYY-MM-DD HH:MM:SS`
/// string yields `None`.
pub fn parse_tm(value: Option<&Value>) -> Option<NaiveDateTime> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(text, TM_FORMAT).ok()
}

/// Parse a range bound given as `YYYY-MM-DD` or `YYYY/MM/DD`.
pub fn parse_date_bound(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_BOUND_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Sort key for timestamps: unparseable values order after every real one.
pub fn tm_sort_key(tm: Option<NaiveDateTime>) -> NaiveDateTime {
    tm.unwrap_or(NaiveDateTime::MAX)
}

/// Optional closed date interval applied to record timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    /// `date_start` / `date_end` as ISO dates, null when open.
    pub fn to_json_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("date_start".into(), json!(self.start.map(|d| d.to_string())));
        fields.insert("date_end".into(), json!(self.end.map(|d| d.to_string())));
        fields
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a record with this `tm` value falls inside the range.
    ///
    /// With no bounds every record passes, even one without a usable
    /// timestamp. Once any bound is set, the timestamp must parse.
    pub fn contains(&self, tm: Option<&Value>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(timestamp) = parse_tm(tm) else {
            return false;
        };
        let date = timestamp.date();

        if matches!(self.start, Some(start) if date < start) {
            return false;
        }
        if matches!(self.end, Some(end) if date > end) {
            return false;
        }
        true
    }
}
