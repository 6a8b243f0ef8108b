use std::io;

use flux_repr::ReprError;

/// Errors surfaced while decoding a response stream.
///
/// Every variant is fatal to the parse call that raised it: partially built
/// blocks and tables are discarded, never returned.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// A physical line could not be split, or a data row's cell count
    /// disagrees with the block schema.
    #[error("malformed row at line {line}: {reason}: '{row}'")]
    MalformedRow {
        line: usize,
        row: String,
        reason: String,
    },

    /// Header reached before the required annotations, or annotation rows
    /// disagree on cell counts.
    #[error("missing annotation at line {line}: {reason}")]
    MissingAnnotation { line: usize, reason: String },

    /// A cell could not be coerced to its declared data kind, or an unknown
    /// kind appeared in a `#datatype` row. `column` is the cell offset in
    /// the physical row.
    #[error("type coercion failed at line {line}, cell {column}: {source}")]
    TypeCoercion {
        line: usize,
        column: usize,
        source: ReprError,
    },

    /// The stream reported a server-side query failure instead of a result.
    /// Message and reference are carried verbatim.
    #[error("query execution failed: {message} (reference: {reference})")]
    QueryExecution { message: String, reference: String },

    /// The underlying stream errored or ended mid-block.
    #[error("stream terminated at line {line}: {reason}")]
    StreamTerminated {
        line: usize,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
}

pub type Result<T, E = ResponseError> = std::result::Result<T, E>;
