// src/processors/mod.rs
pub mod earliest;
pub mod user_aggregate;

pub use earliest::EarliestPerKey;
pub use user_aggregate::{FieldPresence, UserAggregate, UserAggregator};

use crate::pipeline::context::{Accepted, Row};
use crate::pipeline::stages::StageMode;

/// Second phase of a stage: folds accepted records into output rows
pub trait RowReducer {
    fn observe(&mut self, accepted: Accepted<'_>);
    fn finish(self: Box<Self>) -> Reduced;
    fn name(&self) -> &str;
}

/// What a reducer produced
#[derive(Debug, Clone)]
pub enum Reduced {
    /// One row per dedupe key; `dropped` rows lost to an earlier duplicate
    Deduped { rows: Vec<Row>, dropped: usize },
    /// One aggregate per user, ordered by first timestamp then user id
    Aggregated {
        users: Vec<UserAggregate>,
        presence: FieldPresence,
    },
}

impl Reduced {
    /// Output rows in CSV order.
    pub fn rows(&self) -> Vec<Row> {
        match self {
            Reduced::Deduped { rows, .. } => rows.clone(),
            Reduced::Aggregated { users, .. } => users.iter().map(UserAggregate::to_row).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Reduced::Deduped { rows, .. } => rows.len(),
            Reduced::Aggregated { users, .. } => users.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StageMode {
    pub fn reducer(&self) -> Box<dyn RowReducer> {
        match *self {
            StageMode::KeepEarliest { key, project, .. } => Box::new(EarliestPerKey::new(key, project)),
            StageMode::MergeByUser => Box::new(UserAggregator::new()),
        }
    }
}
