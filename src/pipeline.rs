// src/pipeline.rs - Generic filter → reduce → summarize pass shared by every stage
pub mod config;
pub mod context;
pub mod dedupe;
pub mod extra;
pub mod fields;
pub mod filter;
pub mod stages;
pub mod temporal;

use crate::error::Result;
use crate::input_format::{load_records, Record};
use crate::output_format::{write_csv, write_summary};
use crate::processors::Reduced;
use crate::summary::build_summary;
use config::PipelineConfig;
use context::{FilterCounters, ProcessResult, RawStats, Row};
use filter::StageFilter;
use serde_json::Value;
use stages::StageSpec;
use std::time::Instant;
use temporal::DateRange;
use tracing::debug;

/// Everything a stage run produced
#[derive(Debug, Clone)]
pub struct StageReport {
    /// CSV rows, in output order
    pub rows: Vec<Row>,
    pub summary: Value,
    pub counters: FilterCounters,
}

/// Filter and reduce records for one stage, without touching the filesystem.
pub fn filter_records(stage: &StageSpec, records: &[Record], range: DateRange) -> (FilterCounters, Reduced) {
    let filter = StageFilter::new(stage, range);
    let mut counters = FilterCounters::for_stage(stage);
    let mut reducer = stage.mode.reducer();

    for record in records {
        match filter.process(record, &mut counters) {
            ProcessResult::Accept(accepted) => reducer.observe(accepted),
            ProcessResult::Skip(_) => {}
        }
    }

    debug!(
        stage = filter.name(),
        reducer = reducer.name(),
        kept = counters.kept,
        date_filtered_out = counters.date_filtered_out,
        "filter pass complete"
    );
    (counters, reducer.finish())
}

/// Run a stage over already-loaded records and build its report.
pub fn process_records(stage: &StageSpec, records: &[Record], config: &PipelineConfig) -> StageReport {
    let raw = RawStats::tally(records);
    let (counters, reduced) = filter_records(stage, records, config.range);

    match &reduced {
        Reduced::Deduped { dropped, .. } => {
            debug!(stage = stage.name, unique = reduced.len(), dropped, "dedupe complete")
        }
        Reduced::Aggregated { .. } => {
            debug!(stage = stage.name, users = reduced.len(), "aggregation complete")
        }
    }

    let summary = build_summary(stage, config, &raw, &counters, &reduced);
    StageReport {
        rows: reduced.rows(),
        summary,
        counters,
    }
}

/// Load the input, run the stage and write both outputs.
pub fn run_stage(stage: &StageSpec, config: &PipelineConfig) -> Result<StageReport> {
    let started = Instant::now();

    let loaded = load_records(&config.input)?;
    let report = process_records(stage, &loaded.records, config);

    write_csv(&config.output_csv, stage.columns, &report.rows)?;
    write_summary(&config.output_summary, &report.summary)?;

    debug!(
        stage = stage.name,
        rows = report.rows.len(),
        elapsed = %humantime::format_duration(started.elapsed()),
        "stage complete"
    );
    Ok(report)
}
