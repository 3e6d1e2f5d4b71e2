use thiserror::Error;

/// Everything that can go wrong while loading data or computing a report.
///
/// Aggregation itself never fails: an empty group is simply an absent row.
/// `EmptyGroup` exists for callers that resolve a specific key and treat
/// absence as an error (the state lookup). The resilience sample guard is
/// not represented here at all; it surfaces as an excluded-crop count in
/// the report, not as an error.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("no observations contributed to key {key}")]
    EmptyGroup { key: String },

    #[error("exact tie at rank 1 in partition {partition}: {contenders}")]
    AmbiguousTie { partition: String, contenders: String },

    #[error("key {key} appears with conflicting content in a join source")]
    InconsistentKey { key: String },

    #[error("{path}: required column '{column}' is missing")]
    MissingColumn { column: String, path: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
