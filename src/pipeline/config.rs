use crate::pipeline::stages::StageSpec;
use crate::pipeline::temporal::DateRange;
use std::path::PathBuf;

/// Configuration for one stage run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output_csv: PathBuf,
    pub output_summary: PathBuf,
    pub range: DateRange,
}

impl PipelineConfig {
    /// The stage's default paths, with no date range.
    pub fn for_stage(stage: &StageSpec) -> Self {
        PipelineConfig {
            input: PathBuf::from(stage.defaults.input),
            output_csv: PathBuf::from(stage.defaults.output_csv),
            output_summary: PathBuf::from(stage.defaults.output_summary),
            range: DateRange::default(),
        }
    }

    pub fn with_input(mut self, input: Option<PathBuf>) -> Self {
        if let Some(input) = input {
            self.input = input;
        }
        self
    }

    pub fn with_output_csv(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.output_csv = path;
        }
        self
    }

    pub fn with_output_summary(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.output_summary = path;
        }
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }
}
