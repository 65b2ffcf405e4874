// src/lib.rs
pub mod error;
pub mod input_format;
pub mod output_format;
pub mod pipeline;
pub mod processors;
pub mod summary;

pub use error::*;
pub use pipeline::*;

pub use input_format::{load_records, parse_records, DocumentShape, LoadedRecords, Record};
pub use output_format::{ensure_parent_dir, render_summary, write_csv, write_summary};
pub use pipeline::config::PipelineConfig;
pub use pipeline::context::{Accepted, FilterCounters, ProcessResult, RawStats, Row, SkipReason};
pub use pipeline::filter::StageFilter;
pub use pipeline::stages::{stage_by_name, StageSpec, STAGES};
pub use pipeline::temporal::{parse_date_bound, DateRange};
pub use processors::{Reduced, RowReducer};
pub use summary::build_summary;
