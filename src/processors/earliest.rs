// src/processors/earliest.rs
use crate::pipeline::context::{Accepted, Row};
use crate::pipeline::dedupe::{keep_earliest, FilteredRow};
use crate::processors::{Reduced, RowReducer};

/// Projects every accepted record, then keeps the earliest row per key
pub struct EarliestPerKey {
    key: &'static str,
    project: fn(&Accepted) -> Row,
    rows: Vec<FilteredRow>,
}

impl EarliestPerKey {
    pub fn new(key: &'static str, project: fn(&Accepted) -> Row) -> Self {
        EarliestPerKey {
            key,
            project,
            rows: Vec::new(),
        }
    }
}

impl RowReducer for EarliestPerKey {
    fn observe(&mut self, accepted: Accepted<'_>) {
        self.rows.push(FilteredRow::new((self.project)(&accepted)));
    }

    fn finish(self: Box<Self>) -> Reduced {
        let outcome = keep_earliest(self.rows, self.key);
        Reduced::Deduped {
            rows: outcome.rows,
            dropped: outcome.dropped,
        }
    }

    fn name(&self) -> &str {
        "earliest_per_key"
    }
}
