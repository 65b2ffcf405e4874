// src/processors/user_aggregate.rs
use crate::pipeline::context::{Accepted, Row};
use crate::pipeline::fields::{is_nonempty_str, is_truthy_flag};
use crate::pipeline::temporal::{parse_tm, tm_sort_key};
use crate::processors::{Reduced, RowReducer};
use chrono::NaiveDateTime;
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeSet;

pub const GOOGLE_FLAG: &str = "click_google_bind";
pub const APPLE_FLAG: &str = "click_apple_bind";
pub const BIND_RESULT: &str = "bind_result";

/// Separator used when writing the bind-result set into one CSV cell.
pub const BIND_RESULTS_SEPARATOR: &str = ";";

/// Descriptive fields of the earliest record seen for a user
#[derive(Debug, Clone)]
pub struct FirstSeen {
    pub tm: Option<NaiveDateTime>,
    /// Keyed by output column (`first_tm`, `first_platform`, `pkg`, ...)
    pub fields: Row,
}

impl FirstSeen {
    fn capture(accepted: &Accepted, tm: Option<NaiveDateTime>) -> Self {
        let mut fields = Row::new();
        fields.insert("first_tm".into(), accepted.top_field("tm"));
        fields.insert("first_to_date".into(), accepted.top_field("to_date"));
        fields.insert("first_platform".into(), accepted.top_field("platform"));
        for key in ["pkg", "ver", "ip_addr", "model", "android_id", "nickname"] {
            fields.insert(key.into(), accepted.top_field(key));
        }
        fields.insert("extra_userId".into(), accepted.extra_field("userId"));
        FirstSeen { tm, fields }
    }
}

/// One user's merged bind activity
#[derive(Debug, Clone)]
pub struct UserAggregate {
    pub user_id: String,
    pub first: FirstSeen,
    pub clicked_google_bind: bool,
    pub clicked_apple_bind: bool,
    pub bind_results: BTreeSet<String>,
}

impl UserAggregate {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("user_id".into(), Value::String(self.user_id.clone()));
        row.insert("clicked_google_bind".into(), Value::Bool(self.clicked_google_bind));
        row.insert("clicked_apple_bind".into(), Value::Bool(self.clicked_apple_bind));
        row.insert(
            "bind_results".into(),
            Value::String(
                self.bind_results
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(BIND_RESULTS_SEPARATOR),
            ),
        );
        for (key, value) in &self.first.fields {
            row.insert(key.clone(), value.clone());
        }
        row
    }
}

/// How often the bind fields showed up in the raw extra payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldPresence {
    pub google_flag_present: usize,
    pub apple_flag_present: usize,
    pub bind_result_missing: usize,
    pub bind_result_empty: usize,
}

/// Merges every qualifying bind record into one aggregate per user.
///
/// Flags are OR'd, bind results unioned. The descriptive fields come from
/// the record with the earliest parseable timestamp; a later record only
/// replaces them when it is strictly earlier, so ties go to whichever
/// record arrived first.
#[derive(Debug, Default)]
pub struct UserAggregator {
    users: IndexMap<String, UserAggregate>,
    presence: FieldPresence,
}

impl UserAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn track_presence(&mut self, accepted: &Accepted) {
        let extra = &accepted.extra;
        if extra.contains_key(GOOGLE_FLAG) {
            self.presence.google_flag_present += 1;
        }
        if extra.contains_key(APPLE_FLAG) {
            self.presence.apple_flag_present += 1;
        }
        match extra.get(BIND_RESULT) {
            None => self.presence.bind_result_missing += 1,
            Some(value) if !is_nonempty_str(Some(value)) => self.presence.bind_result_empty += 1,
            Some(_) => {}
        }
    }
}

impl RowReducer for UserAggregator {
    fn observe(&mut self, accepted: Accepted<'_>) {
        self.track_presence(&accepted);

        let tm = parse_tm(accepted.record.get("tm"));
        let aggregate = match self.users.entry(accepted.user_id.clone()) {
            Entry::Vacant(slot) => slot.insert(UserAggregate {
                user_id: accepted.user_id.clone(),
                first: FirstSeen::capture(&accepted, tm),
                clicked_google_bind: false,
                clicked_apple_bind: false,
                bind_results: BTreeSet::new(),
            }),
            Entry::Occupied(slot) => {
                let aggregate = slot.into_mut();
                let earlier = match (tm, aggregate.first.tm) {
                    (Some(new), Some(current)) => new < current,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if earlier {
                    aggregate.first = FirstSeen::capture(&accepted, tm);
                }
                aggregate
            }
        };

        aggregate.clicked_google_bind |= is_truthy_flag(accepted.extra.get(GOOGLE_FLAG));
        aggregate.clicked_apple_bind |= is_truthy_flag(accepted.extra.get(APPLE_FLAG));
        if let Some(Value::String(result)) = accepted.extra.get(BIND_RESULT) {
            let result = result.trim();
            if !result.is_empty() {
                aggregate.bind_results.insert(result.to_string());
            }
        }
    }

    fn finish(self: Box<Self>) -> Reduced {
        let mut users: Vec<UserAggregate> = self.users.into_values().collect();
        users.sort_by(|a, b| {
            tm_sort_key(a.first.tm)
                .cmp(&tm_sort_key(b.first.tm))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Reduced::Aggregated {
            users,
            presence: self.presence,
        }
    }

    fn name(&self) -> &str {
        "user_aggregate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_format::Record;
    use crate::pipeline::extra::normalize_extra;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn reduce(records: &[Record]) -> (Vec<UserAggregate>, FieldPresence) {
        let mut aggregator: Box<dyn RowReducer> = Box::new(UserAggregator::new());
        for record in records {
            aggregator.observe(Accepted {
                record,
                extra: normalize_extra(record.get("extra")),
                user_id: record["user_id"].as_str().unwrap().to_string(),
                checked: Default::default(),
            });
        }
        match aggregator.finish() {
            Reduced::Aggregated { users, presence } => (users, presence),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_flags_are_ored_and_results_unioned() {
        let input = records(vec![
            json!({"user_id": "u1", "tm": "2024-01-02 00:00:00", "extra": {"click_google_bind": "yes", "bind_result": "fail"}}),
            json!({"user_id": "u1", "tm": "2024-01-03 00:00:00", "extra": {"click_google_bind": false, "click_apple_bind": 1, "bind_result": " success "}}),
            json!({"user_id": "u1", "tm": "2024-01-04 00:00:00", "extra": {"bind_result": ""}}),
        ]);
        let (users, presence) = reduce(&input);

        assert_eq!(users.len(), 1);
        let u1 = &users[0];
        assert!(u1.clicked_google_bind);
        assert!(u1.clicked_apple_bind);
        assert_eq!(
            u1.bind_results.iter().cloned().collect::<Vec<_>>(),
            vec!["fail".to_string(), "success".to_string()]
        );
        assert_eq!(u1.to_row()["bind_results"], "fail;success");

        assert_eq!(
            presence,
            FieldPresence {
                google_flag_present: 2,
                apple_flag_present: 1,
                bind_result_missing: 0,
                bind_result_empty: 1,
            }
        );
    }

    #[test]
    fn test_first_seen_tracks_earliest_timestamp() {
        let input = records(vec![
            json!({"user_id": "u1", "tm": "bad", "platform": "web"}),
            json!({"user_id": "u1", "tm": "2024-01-05 00:00:00", "platform": "ios"}),
            json!({"user_id": "u1", "tm": "2024-01-01 00:00:00", "platform": "android"}),
            json!({"user_id": "u1", "tm": "2024-01-01 00:00:00", "platform": "tie-loser"}),
        ]);
        let (users, _) = reduce(&input);

        let row = users[0].to_row();
        assert_eq!(row["first_platform"], "android");
        assert_eq!(row["first_tm"], "2024-01-01 00:00:00");
    }

    #[test]
    fn test_first_record_kept_when_no_timestamp_parses() {
        let input = records(vec![
            json!({"user_id": "u1", "platform": "first"}),
            json!({"user_id": "u1", "tm": "nope", "platform": "second"}),
        ]);
        let (users, _) = reduce(&input);
        assert_eq!(users[0].to_row()["first_platform"], "first");
    }

    #[test]
    fn test_users_ordered_by_first_tm_then_id() {
        let input = records(vec![
            json!({"user_id": "zed", "tm": "2024-01-01 00:00:00"}),
            json!({"user_id": "none", "tm": ""}),
            json!({"user_id": "bob", "tm": "2024-01-02 00:00:00"}),
            json!({"user_id": "amy", "tm": "2024-01-01 00:00:00"}),
        ]);
        let (users, _) = reduce(&input);
        let order: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(order, vec!["amy", "zed", "bob", "none"]);
    }

    #[test]
    fn test_missing_bind_result_counted() {
        let input = records(vec![json!({"user_id": "u1", "extra": "{\"click_apple_bind\": \"on\"}"})]);
        let (users, presence) = reduce(&input);
        assert!(users[0].clicked_apple_bind);
        assert!(!users[0].clicked_google_bind);
        assert_eq!(presence.bind_result_missing, 1);
    }
}
