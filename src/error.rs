use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FunnelError>;

/// Fatal errors. Anything raised here aborts the run before output is written;
/// field-level problems never surface as errors, only as summary counters.
#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported JSON format: expected a list of objects (or a dict wrapping a list)")]
    UnsupportedFormat,

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
