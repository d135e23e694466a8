mod classify;
mod error;
mod header;
mod reader;
mod survey;
mod types;

use serde::Deserialize;

pub use classify::classify;
pub use error::ImportError;
pub use header::{parse_metadata, ColumnMeta, HeaderMatcher, QuestionGroup, RawColumn};
pub use reader::read_csv;
pub use survey::parse;
pub use types::*;

/// Where the import finds identity, completion and question columns.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Header of the respondent identifier column.
    pub id_column: String,
    /// Header of the completion marker. Rows pass when it reads `1` or `true`;
    /// if the header is absent every row passes.
    pub completed_column: String,
    /// Regex matched against headers; capture group 1 is the question id.
    pub question_pattern: String,
    /// Header suffix of free-text slots.
    pub text_suffix: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            id_column: "ResponseId".to_string(),
            completed_column: "Finished".to_string(),
            question_pattern: r"^(Q\d+)(?:_|$)".to_string(),
            text_suffix: "_TEXT".to_string(),
        }
    }
}

/// Read CSV text and import it in one go.
pub fn parse_csv(text: &str, cfg: &ImportConfig) -> Result<Survey, ImportError> {
    let table = read_csv(text)?;
    parse(&table, cfg)
}
