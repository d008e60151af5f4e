//! Error types for the purga library.

use thiserror::Error;

/// Result type alias for purga operations.
pub type Result<T> = std::result::Result<T, PurgaError>;

/// Errors that can occur during contig selection.
#[derive(Error, Debug)]
pub enum PurgaError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed input row (PAF, distance table, FASTA index)
    #[error("Malformed {kind} input at line {line}: {message}")]
    InputShape {
        kind: &'static str,
        line: usize,
        message: String,
    },

    /// Too many malformed rows in one input stream
    #[error("{malformed} of {total} {kind} rows malformed (more than {limit_percent}%), aborting")]
    TooManyMalformedRows {
        kind: &'static str,
        malformed: usize,
        total: usize,
        limit_percent: f64,
    },

    /// Sequence identifiers referenced by an input are absent from the FASTA index
    #[error("{kind} input references {count} identifier(s) absent from the FASTA index, e.g. {examples:?}")]
    InputConsistency {
        kind: &'static str,
        count: usize,
        examples: Vec<String>,
    },

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Estimated memory footprint exceeds the configured limit
    #[error("Estimated memory footprint {estimated} bytes exceeds limit {limit} bytes")]
    MemoryLimitExceeded { estimated: u64, limit: u64 },

    /// The threshold estimator could not derive a usable threshold
    #[error(
        "Cannot estimate a distance threshold ({reason}); sample n={n}, min={min:.4}, \
         median={median:.4}, max={max:.4}. Supply one with Config::distance_threshold"
    )]
    EstimatorDegenerate {
        reason: String,
        n: usize,
        min: f64,
        median: f64,
        max: f64,
    },

    /// Selection was cancelled through the caller's cancel flag
    #[error("Selection was cancelled")]
    Cancelled,

    /// Internal invariant violated; indicates a bug in this library
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),
}
