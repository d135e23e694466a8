// Header and metadata recognition.
//
// A raw export has one physical column per answer slot. Slots that belong to
// the same question share a question id token at the start of their header:
//
//     Q1            single choice
//     Q2_1, Q2_2    one slot per choice of a multiple choice question
//     Q2_4_TEXT     free text typed into choice 4 ("Other")
//
// Row 1 of the export holds JSON metadata per slot, e.g.
// {"ImportId":"QID2","choiceId":"1"}. Metadata is advisory: cells that fail
// to parse are treated as carrying no marker.

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use super::error::ImportError;
use super::types::{ChoiceId, RawTable};
use super::ImportConfig;

/// Row holding the human-readable question text.
pub const QUESTION_TEXT_ROW: usize = 0;
/// Row holding per-column metadata JSON.
pub const METADATA_ROW: usize = 1;
/// First respondent row.
pub const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMeta {
    pub import_id: Option<String>,
    pub choice_id: Option<ChoiceId>,
}

#[derive(Deserialize)]
struct RawMeta {
    #[serde(rename = "ImportId")]
    import_id: Option<String>,
    #[serde(rename = "choiceId")]
    choice_id: Option<serde_json::Value>,
}

/// Parse one metadata cell. Never fails.
pub fn parse_metadata(cell: &str) -> ColumnMeta {
    let cell = cell.trim();
    if cell.is_empty() {
        return ColumnMeta::default();
    }
    match serde_json::from_str::<RawMeta>(cell) {
        Ok(raw) => ColumnMeta {
            import_id: raw.import_id,
            choice_id: raw.choice_id.as_ref().and_then(choice_id_from_json),
        },
        Err(err) => {
            tracing::warn!(cell, %err, "ignoring unparsable column metadata");
            ColumnMeta::default()
        }
    }
}

fn choice_id_from_json(value: &serde_json::Value) -> Option<ChoiceId> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| ChoiceId::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One physical export column that belongs to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    /// Index into the table's records.
    pub index: usize,
    pub header: String,
    pub question_text: String,
    pub meta: ColumnMeta,
    /// Header carries the free-text suffix.
    pub free_text: bool,
    /// Choice token embedded in the header (`4` in `Q2_4_TEXT`).
    pub header_choice: Option<ChoiceId>,
}

impl RawColumn {
    pub fn has_choice_marker(&self) -> bool {
        self.meta.choice_id.is_some()
    }
}

/// All export columns sharing one question id, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionGroup {
    pub id: String,
    pub columns: Vec<RawColumn>,
}

impl QuestionGroup {
    pub fn free_text_columns(&self) -> impl Iterator<Item = &RawColumn> {
        self.columns.iter().filter(|c| c.free_text)
    }

    pub fn choice_columns(&self) -> impl Iterator<Item = &RawColumn> {
        self.columns.iter().filter(|c| !c.free_text)
    }
}

pub struct HeaderMatcher {
    pattern: Regex,
    text_suffix: String,
}

impl HeaderMatcher {
    pub fn new(cfg: &ImportConfig) -> Result<Self, ImportError> {
        Ok(Self {
            pattern: Regex::new(&cfg.question_pattern)?,
            text_suffix: cfg.text_suffix.clone(),
        })
    }

    /// Question id token of a header, or None if the header is not a question slot.
    pub fn question_id<'a>(&self, header: &'a str) -> Option<&'a str> {
        let caps = self.pattern.captures(header)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }

    pub fn is_free_text(&self, header: &str) -> bool {
        !self.text_suffix.is_empty() && header.ends_with(&self.text_suffix)
    }

    fn header_choice(&self, header: &str, question_id: &str) -> Option<ChoiceId> {
        let rest = header.strip_prefix(question_id)?.trim_start_matches('_');
        let rest = rest.strip_suffix(&self.text_suffix).unwrap_or(rest);
        rest.trim_end_matches('_').parse().ok()
    }

    /// Group question columns by id, preserving the order in which ids first appear.
    pub fn group_columns(&self, table: &RawTable) -> Vec<QuestionGroup> {
        let mut groups: IndexMap<String, Vec<RawColumn>> = IndexMap::new();

        for (index, header) in table.headers.iter().enumerate() {
            let Some(qid) = self.question_id(header) else {
                continue;
            };
            let column = RawColumn {
                index,
                header: header.clone(),
                question_text: table.cell(QUESTION_TEXT_ROW, index).trim().to_string(),
                meta: parse_metadata(table.cell(METADATA_ROW, index)),
                free_text: self.is_free_text(header),
                header_choice: self.header_choice(header, qid),
            };
            groups.entry(qid.to_string()).or_default().push(column);
        }

        groups
            .into_iter()
            .map(|(id, columns)| QuestionGroup { id, columns })
            .collect()
    }
}

/// Label embedded in a slot's question text, e.g.
/// "Which fruit? - Selected Choice - Apple" -> "Apple".
pub fn label_from_question_text(text: &str) -> Option<&str> {
    let (_, label) = text.rsplit_once(" - ")?;
    let label = label.trim();
    (!label.is_empty()).then_some(label)
}

/// Question text without the per-slot suffix.
pub fn stem_of_question_text(text: &str) -> &str {
    match text.split_once(" - ") {
        Some((stem, _)) => stem.trim(),
        None => text.trim(),
    }
}
