use thiserror::Error;

/// Structural failures of a survey import. Messy individual cells are not
/// errors; they are skipped.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("survey export is empty (expected a header, question text and metadata rows)")]
    Empty,
    #[error("identifier column `{0}` is missing")]
    MissingIdentifierColumn(String),
    #[error("no header matches the question id pattern")]
    NoQuestionColumns,
    #[error("no completed responses with an identifier")]
    NoResponses,
    #[error("invalid question pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

impl ImportError {
    /// Stable machine-readable name, used by the JS side.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Empty => "empty",
            ImportError::MissingIdentifierColumn(_) => "missing_identifier_column",
            ImportError::NoQuestionColumns => "no_question_columns",
            ImportError::NoResponses => "no_responses",
            ImportError::Pattern(_) => "pattern",
            ImportError::Csv(_) => "csv",
        }
    }
}
