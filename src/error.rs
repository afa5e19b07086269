use thiserror::Error;

/// Errors produced by the tsio toolkit.
///
/// Most of them never reach a caller of the ingest path: the reassembler, the
/// audio splitters and the timeline analyzer turn them into a fallback (drop,
/// pass-through or disable-seek) and only log them.
#[derive(Error, Debug)]
pub enum TsError {
    /// Error reported by the underlying byte source
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input bytes that do not follow the expected syntax
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Bit-level parsing ran past the available data
    #[error("parser error: {0}")]
    Parser(String),

    /// A stream feature the splitter does not handle
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A timeline operation exceeded its time budget
    #[error("timeout reached in {operation} after {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout {
        /// Name of the operation that timed out
        operation: &'static str,
        /// Time spent so far
        elapsed_ms: u128,
        /// Configured budget
        limit_ms: u64,
    },

    /// No PCR could be located in the scanned range
    #[error("no pcr found from position {0}")]
    PcrNotFound(i64),

    /// The source has no usable timeline
    #[error("source is not seekable")]
    NotSeekable,

    /// Encapsulation packet could not be encoded or decoded
    #[error("encapsulation error: {0}")]
    Encapsulation(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, TsError>;
