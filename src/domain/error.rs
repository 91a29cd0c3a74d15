//! Domain error types.

use chrono::NaiveDateTime;

/// A parse error with position information for feature-spec parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for barwise.
#[derive(Debug, thiserror::Error)]
pub enum BarwiseError {
    #[error("feature engine not ready: have {have} bars, need {need}")]
    NotReady { have: usize, need: usize },

    #[error("malformed input at row {row}: {reason}")]
    MalformedInput { row: usize, reason: String },

    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("bar at {time} does not follow previous bar at {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        time: NaiveDateTime,
    },

    #[error("unknown feature column {name}")]
    UnknownColumn { name: String },

    #[error("column {name} has {actual} rows, table has {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported timeframe name: {name}")]
    UnsupportedTimeframe { name: String },

    #[error("unsupported configuration: {reason}")]
    UnsupportedConfig { reason: String },

    #[error(transparent)]
    FeatureParse(#[from] ParseError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("position {id} not found")]
    PositionNotFound { id: String },

    #[error("invalid exit decision: {reason}")]
    InvalidDecision { reason: String },

    #[error(
        "streaming and bulk features diverge at row {row}, column {column}: \
         {streaming:?} != {bulk:?}"
    )]
    Divergence {
        row: usize,
        column: String,
        streaming: Option<f64>,
        bulk: Option<f64>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BarwiseError> for std::process::ExitCode {
    fn from(err: &BarwiseError) -> Self {
        let code: u8 = match err {
            BarwiseError::Io(_) => 1,
            BarwiseError::ConfigParse { .. }
            | BarwiseError::ConfigMissing { .. }
            | BarwiseError::ConfigInvalid { .. }
            | BarwiseError::UnsupportedTimeframe { .. }
            | BarwiseError::UnsupportedConfig { .. } => 2,
            BarwiseError::BackendUnavailable { .. } => 3,
            BarwiseError::FeatureParse(_) | BarwiseError::UnknownColumn { .. } => 4,
            BarwiseError::NotReady { .. }
            | BarwiseError::MalformedInput { .. }
            | BarwiseError::MissingColumns { .. }
            | BarwiseError::OutOfOrder { .. }
            | BarwiseError::ColumnLength { .. }
            | BarwiseError::Divergence { .. } => 5,
            BarwiseError::PositionNotFound { .. } | BarwiseError::InvalidDecision { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
