// src/pipeline/filter.rs
use crate::input_format::Record;
use crate::pipeline::context::{Accepted, FilterCounters, ProcessResult, SkipReason};
use crate::pipeline::extra::normalize_extra;
use crate::pipeline::fields::stringify_trimmed;
use crate::pipeline::stages::{CheckOutcome, StageSpec};
use crate::pipeline::temporal::DateRange;
use indexmap::IndexMap;
use serde_json::Value;

/// Per-record accept/reject decision for one stage.
///
/// Checks run in a fixed order: event name, date range, top-level `user_id`
/// (stages keyed by user), then each extra-field check as listed on the
/// stage. The first failing check decides the skip reason and is the only
/// counter bumped.
pub struct StageFilter<'s> {
    stage: &'s StageSpec,
    range: DateRange,
}

impl<'s> StageFilter<'s> {
    pub fn new(stage: &'s StageSpec, range: DateRange) -> Self {
        StageFilter { stage, range }
    }

    pub fn name(&self) -> &str {
        self.stage.name
    }

    pub fn process<'r>(&self, record: &'r Record, counters: &mut FilterCounters) -> ProcessResult<'r> {
        if record.get("event").and_then(Value::as_str) != Some(self.stage.event) {
            return ProcessResult::Skip(SkipReason::OtherEvent);
        }

        if !self.range.contains(record.get("tm")) {
            counters.date_filtered_out += 1;
            return ProcessResult::Skip(SkipReason::OutOfRange);
        }

        let user_id = stringify_trimmed(record.get("user_id"));
        if self.stage.require_user_id && user_id.is_empty() {
            counters.user_id_blank += 1;
            return ProcessResult::Skip(SkipReason::BlankUserId);
        }

        let extra = normalize_extra(record.get("extra"));
        let mut checked = IndexMap::new();

        for check in self.stage.checks {
            let outcome = check.evaluate(&extra);
            let tally = counters.check_mut(check.key);

            let reason = match outcome {
                CheckOutcome::Pass(value) => {
                    if check.count_nonempty {
                        tally.nonempty += 1;
                    }
                    checked.insert(check.key, value);
                    continue;
                }
                CheckOutcome::Missing => {
                    tally.missing += 1;
                    SkipReason::Missing(check.key)
                }
                CheckOutcome::Empty => {
                    tally.empty += 1;
                    SkipReason::Empty(check.key)
                }
                CheckOutcome::InvalidFormat(value) => {
                    tally.invalid_format += 1;
                    *tally.invalid_values.entry(value.clone()).or_insert(0) += 1;
                    SkipReason::InvalidFormat {
                        key: check.key,
                        value,
                    }
                }
            };

            if check.required {
                return ProcessResult::Skip(reason);
            }
        }

        counters.kept += 1;
        ProcessResult::Accept(Accepted {
            record,
            extra,
            user_id,
            checked,
        })
    }
}
