use std::fmt;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::layout::LayoutError;

/// Numeric identifier of an answer choice within one column.
pub type ChoiceId = u32;

/// Raw cells as read from the export: one header row plus records.
/// `rows[0]` holds question text, `rows[1]` holds per-column metadata JSON,
/// data rows follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Column index of a header, if present.
    pub fn position(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell at (row, col). Short records read as empty cells.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Single,
    Multiple,
    Text,
    Multitext,
    MultipleMultitext,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Single => "SINGLE",
            QuestionType::Multiple => "MULTIPLE",
            QuestionType::Text => "TEXT",
            QuestionType::Multitext => "MULTITEXT",
            QuestionType::MultipleMultitext => "MULTIPLE_MULTITEXT",
        }
    }

    /// Whether answers of this type resolve to choice ids.
    pub fn has_choices(&self) -> bool {
        matches!(
            self,
            QuestionType::Single | QuestionType::Multiple | QuestionType::MultipleMultitext
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE" => Ok(QuestionType::Single),
            "MULTIPLE" => Ok(QuestionType::Multiple),
            "TEXT" => Ok(QuestionType::Text),
            "MULTITEXT" => Ok(QuestionType::Multitext),
            "MULTIPLE_MULTITEXT" => Ok(QuestionType::MultipleMultitext),
            other => Err(LayoutError::UnknownQuestionType(other.to_string())),
        }
    }
}

/// A survey question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Question id token taken from the source header (e.g. `Q3`).
    pub id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Choice id -> display label, in declaration order.
    pub choices: IndexMap<ChoiceId, String>,
    /// Label of the choice that unmatched free-text answers fall back to.
    pub other_choice_label: Option<String>,
}

impl Column {
    /// Inverse label lookup.
    pub fn choice_id(&self, label: &str) -> Option<ChoiceId> {
        self.choices
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(&id, _)| id)
    }

    pub fn label(&self, id: ChoiceId) -> Option<&str> {
        self.choices.get(&id).map(String::as_str)
    }

    /// Resolve one raw answer to a choice id, falling back to the
    /// "other" choice when the text matches no label.
    pub fn resolve(&self, answer: &str) -> Option<ChoiceId> {
        self.choice_id(answer).or_else(|| {
            self.other_choice_label
                .as_deref()
                .and_then(|other| self.choice_id(other))
        })
    }
}

/// One respondent's answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub id: String,
    /// Column id -> raw (trimmed, non-empty) answer texts in column order.
    pub answers: IndexMap<String, Vec<String>>,
    /// Column id -> resolved choice ids, deduplicated, in resolution order.
    pub answer_ids: IndexMap<String, IndexSet<ChoiceId>>,
}

impl Response {
    pub fn answer_ids_for(&self, column_id: &str) -> Option<&IndexSet<ChoiceId>> {
        self.answer_ids.get(column_id).filter(|ids| !ids.is_empty())
    }

    pub fn has_answers(&self) -> bool {
        self.answers.values().any(|a| !a.is_empty())
    }
}

/// One imported dataset. Replaced wholesale on re-import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Survey {
    pub columns: Vec<Column>,
    pub responses: Vec<Response>,
}

impl Survey {
    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }
}
