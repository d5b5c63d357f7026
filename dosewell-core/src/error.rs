use std::path::PathBuf;

/// Errors caused by user-supplied inputs (plate layouts, condition labels,
/// conversion arguments). The CLI catches these at its outermost boundary
/// and turns them into a clean non-zero exit; everything else propagates
/// with a full trace.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(
        "Condition {label} ({tokens}) not found in remaining results. Make sure it does not \
         contain any unexpected characters and is not equivalent to another condition."
    )]
    ConditionNotFound { label: String, tokens: String },

    #[error("Malformed condition label {label:?}: {reason}")]
    MalformedLabel { label: String, reason: String },

    #[error("Malformed conversion {argument:?}: expected KEY=VALUE")]
    MalformedConversion { argument: String },

    #[error("Unsupported well count {0}; expected one of 6, 24, 96, 384")]
    UnsupportedWellCount(usize),

    #[error("Plate schematic has no populated rows")]
    EmptySchematic,

    #[error("{}: {reason}", .path.display())]
    MalformedFile { path: PathBuf, reason: String },

    #[error("Invalid group pattern {pattern:?}: {reason}")]
    BadGroupPattern { pattern: String, reason: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UserError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UserError::Io { path: path.into(), source }
    }
}

/// Errors from the response-surface fit.
///
/// `NonSquare` is the one recognized, recoverable shape: the interaction
/// analyzer downgrades it to an informational message and moves on to the
/// next drug pair. Every other numerical failure is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("dose and response arrays disagree in length, or the response matrix is not rectangular")]
    NonSquare,

    #[error("response-surface fit failed: {0}")]
    Numeric(String),
}
