//! Run summary: raw counts, filter diagnostics, dedupe stats and breakdowns.
//!
//! Every histogram here is first-seen ordered, so two runs over the same
//! input serialize to identical bytes.

use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::{FilterCounters, RawStats, Row};
use crate::pipeline::fields::is_nonempty_str;
use crate::pipeline::stages::{Breakdown, CheckRule, StageMode, StageSpec};
use crate::processors::{FieldPresence, Reduced, UserAggregate};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// Number of entries kept in the invalid-value histograms.
pub const TOP_INVALID_VALUES: usize = 20;

/// Key used when a value is tallied in a histogram. Unlike CSV cells, null
/// is spelled out.
pub fn histogram_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Count rows per value of `column`, optionally skipping blank values.
pub fn histogram(rows: &[Row], column: &str, nonempty_only: bool) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for row in rows {
        let value = row.get(column);
        if nonempty_only && !is_nonempty_str(value) {
            continue;
        }
        *counts.entry(histogram_key(value)).or_insert(0) += 1;
    }
    counts
}

/// The `limit` most frequent values, most frequent first; equal counts keep
/// first-seen order.
pub fn top_values(counts: &IndexMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}

fn counts_to_json<I>(entries: I) -> Value
where
    I: IntoIterator<Item = (String, usize)>,
{
    Value::Object(entries.into_iter().map(|(k, v)| (k, json!(v))).collect())
}

/// Build the summary document for one stage run.
pub fn build_summary(
    stage: &StageSpec,
    config: &PipelineConfig,
    raw: &RawStats,
    counters: &FilterCounters,
    reduced: &Reduced,
) -> Value {
    let mut summary = Map::new();

    summary.insert("input_path".into(), json!(config.input.display().to_string()));
    summary.insert("output_csv".into(), json!(config.output_csv.display().to_string()));
    summary.insert("raw_total_rows".into(), json!(raw.total_rows));
    summary.insert(
        "raw_event_counts".into(),
        counts_to_json(raw.event_counts.clone()),
    );
    summary.insert("stage".into(), json!(stage.name));
    summary.insert("filter".into(), filter_description(stage, config));
    summary.insert(
        format!("raw_{}_rows", stage.event),
        json!(raw.event_rows(stage.event)),
    );
    summary.insert(
        "date_filtered_out_rows".into(),
        json!(counters.date_filtered_out),
    );
    if stage.require_user_id {
        summary.insert(
            "user_id_missing_or_blank_rows".into(),
            json!(counters.user_id_blank),
        );
    }

    for check in stage.checks {
        let Some(tally) = counters.check(check.key) else {
            continue;
        };
        let key = check.key;
        summary.insert(format!("{key}_missing_in_extra"), json!(tally.missing));
        summary.insert(format!("{key}_empty_or_blank"), json!(tally.empty));
        if check.rule == CheckRule::UtmSource {
            summary.insert(format!("{key}_invalid_format"), json!(tally.invalid_format));
            summary.insert(
                format!("{key}_invalid_values_top"),
                counts_to_json(top_values(&tally.invalid_values, TOP_INVALID_VALUES)),
            );
        }
        if check.count_nonempty {
            summary.insert(format!("{key}_nonempty_rows"), json!(tally.nonempty));
        }
    }

    match reduced {
        Reduced::Deduped { rows, dropped } => {
            summary.insert("kept_after_filter".into(), json!(counters.kept));
            if let StageMode::KeepEarliest { key, unique_label, .. } = stage.mode {
                summary.insert("dedupe_key".into(), json!(key));
                summary.insert(unique_label.into(), json!(rows.len()));
            }
            summary.insert("dedupe_dropped_rows".into(), json!(dropped));
            summary.insert("breakdown".into(), breakdowns(stage.breakdowns, rows));
        }
        Reduced::Aggregated { users, presence } => {
            summary.insert("dedupe".into(), bind_dedupe(users));
            summary.insert("extra_field_presence".into(), presence_json(presence));
            summary.insert("csv_rows_unique_user_id".into(), json!(users.len()));
        }
    }

    Value::Object(summary)
}

fn filter_description(stage: &StageSpec, config: &PipelineConfig) -> Value {
    let mut filter = Map::new();
    filter.insert("event".into(), json!(stage.event));
    for check in stage.required_checks() {
        filter.insert(format!("extra.{}", check.key), json!("non-empty string"));
    }
    filter.extend(config.range.to_json_fields());
    Value::Object(filter)
}

fn breakdowns(specs: &[Breakdown], rows: &[Row]) -> Value {
    let mut out = Map::new();
    for spec in specs {
        match *spec {
            Breakdown::By { label, column } => {
                out.insert(label.into(), counts_to_json(histogram(rows, column, false)));
            }
            Breakdown::ByNonEmpty { label, column } => {
                out.insert(label.into(), counts_to_json(histogram(rows, column, true)));
            }
            Breakdown::NonEmptyCount { label, column } => {
                let count = rows.iter().filter(|row| is_nonempty_str(row.get(column))).count();
                out.insert(label.into(), json!(count));
            }
        }
    }
    Value::Object(out)
}

fn bind_dedupe(users: &[UserAggregate]) -> Value {
    let google = users.iter().filter(|u| u.clicked_google_bind).count();
    let apple = users.iter().filter(|u| u.clicked_apple_bind).count();

    let mut by_value: IndexMap<String, usize> = IndexMap::new();
    for user in users {
        for result in &user.bind_results {
            *by_value.entry(result.clone()).or_insert(0) += 1;
        }
    }
    let mut by_value: Vec<(String, usize)> = by_value.into_iter().collect();
    by_value.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    json!({
        "click_google_bind": {"dedupe_key": "user_id", "unique_user_id": google},
        "click_apple_bind": {"dedupe_key": "user_id", "unique_user_id": apple},
        "bind_result": {
            "dedupe_key": "user_id",
            "unique_user_id_by_value": counts_to_json(by_value),
        },
    })
}

fn presence_json(presence: &FieldPresence) -> Value {
    json!({
        "click_google_bind_present_rows": presence.google_flag_present,
        "click_apple_bind_present_rows": presence.apple_flag_present,
        "bind_result_missing_in_extra_rows": presence.bind_result_missing,
        "bind_result_empty_or_blank_rows": presence.bind_result_empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_values_orders_by_count_then_first_seen() {
        let mut counts = IndexMap::new();
        counts.insert("b".to_string(), 1);
        counts.insert("a".to_string(), 3);
        counts.insert("c".to_string(), 1);
        counts.insert("d".to_string(), 3);

        let top = top_values(&counts, 3);
        assert_eq!(
            top,
            vec![("a".to_string(), 3), ("d".to_string(), 3), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn test_top_values_caps_at_limit() {
        let counts: IndexMap<String, usize> = (0..30).map(|i| (format!("v{i}"), 1)).collect();
        let top = top_values(&counts, TOP_INVALID_VALUES);
        assert_eq!(top.len(), 20);
        assert_eq!(top[0].0, "v0");
        assert_eq!(top[19].0, "v19");
    }

    #[test]
    fn test_histogram_keys() {
        let rows: Vec<Row> = vec![
            json!({"platform": "ios"}),
            json!({"platform": null}),
            json!({}),
            json!({"platform": "ios"}),
            json!({"platform": "  "}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();

        let all = histogram(&rows, "platform", false);
        assert_eq!(all["ios"], 2);
        assert_eq!(all["null"], 2);
        assert_eq!(all["  "], 1);
        assert_eq!(all.keys().next().map(String::as_str), Some("ios"));

        let nonempty = histogram(&rows, "platform", true);
        assert_eq!(nonempty.len(), 1);
        assert_eq!(nonempty["ios"], 2);
    }
}
