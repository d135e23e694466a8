// Import pipeline: RawTable -> Survey.
//
// Steps, in order:
// - locate the identifier and completion columns
// - group question slots by question id and classify each question
// - keep data rows that have an identifier and are completed
// - collect trimmed answers per question, in slot order
// - cleanup: drop "# 12" artifacts from MULTITEXT answers, then drop
//   responses that are left without answers
// - extract choices (first-seen values for SINGLE, declared ids for MULTIPLE)
// - resolve answer texts to choice ids
//
// Row order is authoritative end to end. Choice ids and labels depend on it.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

use super::classify::classify;
use super::error::ImportError;
use super::header::{
    label_from_question_text, stem_of_question_text, HeaderMatcher, QuestionGroup, FIRST_DATA_ROW,
};
use super::types::{ChoiceId, Column, QuestionType, RawTable, Response, Survey};
use super::ImportConfig;

static NUMBERED_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*\d+$").expect("static regex"));

pub fn parse(table: &RawTable, cfg: &ImportConfig) -> Result<Survey, ImportError> {
    if table.headers.is_empty() || table.rows.len() < FIRST_DATA_ROW {
        return Err(ImportError::Empty);
    }

    let id_col = table
        .position(&cfg.id_column)
        .ok_or_else(|| ImportError::MissingIdentifierColumn(cfg.id_column.clone()))?;
    let completed_col = table.position(&cfg.completed_column);

    let matcher = HeaderMatcher::new(cfg)?;
    let groups = matcher.group_columns(table);
    if groups.is_empty() {
        return Err(ImportError::NoQuestionColumns);
    }
    let kinds: Vec<QuestionType> = groups.iter().map(classify).collect();

    // Rows with an identifier and the completed flag set
    let data_rows = FIRST_DATA_ROW..table.rows.len();
    let total_rows = data_rows.len();
    let mut kept: Vec<(usize, Response)> = data_rows
        .filter(|&row| !table.cell(row, id_col).trim().is_empty())
        .filter(|&row| completed_col.is_none_or(|c| is_completed(table.cell(row, c))))
        .map(|row| (row, collect_answers(table, row, id_col, &groups)))
        .collect();

    cleanup(&mut kept, &groups, &kinds);
    if kept.is_empty() {
        return Err(ImportError::NoResponses);
    }

    let rows: Vec<usize> = kept.iter().map(|(row, _)| *row).collect();
    let columns: Vec<Column> = groups
        .iter()
        .zip(&kinds)
        .map(|(group, &kind)| build_column(table, group, kind, &rows))
        .collect();

    let responses: Vec<Response> = kept
        .into_iter()
        .map(|(_, mut response)| {
            resolve_answer_ids(&mut response, &columns);
            response
        })
        .collect();

    tracing::debug!(
        columns = columns.len(),
        responses = responses.len(),
        dropped = total_rows - responses.len(),
        "survey imported"
    );

    Ok(Survey { columns, responses })
}

fn is_completed(cell: &str) -> bool {
    let cell = cell.trim();
    cell == "1" || cell.eq_ignore_ascii_case("true")
}

fn collect_answers(table: &RawTable, row: usize, id_col: usize, groups: &[QuestionGroup]) -> Response {
    let mut answers: IndexMap<String, Vec<String>> = IndexMap::new();

    for group in groups {
        let values: Vec<String> = group
            .columns
            .iter()
            .map(|c| table.cell(row, c.index).trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if !values.is_empty() {
            answers.insert(group.id.clone(), values);
        }
    }

    Response {
        id: table.cell(row, id_col).trim().to_string(),
        answers,
        answer_ids: IndexMap::new(),
    }
}

/// Drop numbered artifacts from MULTITEXT answers, then responses left empty.
fn cleanup(kept: &mut Vec<(usize, Response)>, groups: &[QuestionGroup], kinds: &[QuestionType]) {
    for (_, response) in kept.iter_mut() {
        for (group, kind) in groups.iter().zip(kinds) {
            if *kind != QuestionType::Multitext {
                continue;
            }
            if let Some(values) = response.answers.get_mut(&group.id) {
                values.retain(|v| !NUMBERED_ARTIFACT.is_match(v));
                if values.is_empty() {
                    response.answers.shift_remove(&group.id);
                }
            }
        }
    }
    kept.retain(|(_, response)| response.has_answers());
}

fn build_column(table: &RawTable, group: &QuestionGroup, kind: QuestionType, rows: &[usize]) -> Column {
    let question_text = group
        .columns
        .first()
        .map(|c| stem_of_question_text(&c.question_text).to_string())
        .unwrap_or_default();

    let choices = match kind {
        QuestionType::Single => first_seen_choices(table, group, rows),
        QuestionType::Multiple | QuestionType::MultipleMultitext => declared_choices(table, group, rows),
        QuestionType::Text | QuestionType::Multitext => IndexMap::new(),
    };
    let other_choice_label = other_choice_label(group, kind, &choices);

    Column {
        id: group.id.clone(),
        question_text,
        kind,
        choices,
        other_choice_label,
    }
}

/// SINGLE: distinct values numbered from 1 in order of first appearance.
fn first_seen_choices(table: &RawTable, group: &QuestionGroup, rows: &[usize]) -> IndexMap<ChoiceId, String> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    for &row in rows {
        for column in group.choice_columns() {
            let value = table.cell(row, column.index).trim();
            if !value.is_empty() {
                seen.insert(value);
            }
        }
    }
    seen.into_iter()
        .zip(1..)
        .map(|(label, id)| (id, label.to_string()))
        .collect()
}

/// MULTIPLE: one choice per marked slot. The label is the first respondent's
/// value in that slot, else the label embedded in the slot's question text.
fn declared_choices(table: &RawTable, group: &QuestionGroup, rows: &[usize]) -> IndexMap<ChoiceId, String> {
    let mut choices = IndexMap::new();

    for column in &group.columns {
        let marker = if column.free_text {
            column.meta.choice_id
        } else {
            column.meta.choice_id.or(column.header_choice)
        };
        let Some(id) = marker else {
            continue;
        };
        if choices.contains_key(&id) {
            continue;
        }

        let first_answer = if column.free_text {
            None
        } else {
            rows.iter()
                .map(|&row| table.cell(row, column.index).trim())
                .find(|v| !v.is_empty())
        };
        let label = first_answer
            .or_else(|| label_from_question_text(&column.question_text))
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string());
        choices.insert(id, label);
    }
    choices
}

fn other_choice_label(group: &QuestionGroup, kind: QuestionType, choices: &IndexMap<ChoiceId, String>) -> Option<String> {
    if !kind.has_choices() {
        return None;
    }
    let text_column = group.free_text_columns().next()?;

    let by_marker = match kind {
        QuestionType::Multiple | QuestionType::MultipleMultitext => {
            text_column.header_choice.and_then(|id| choices.get(&id))
        }
        _ => None,
    };
    by_marker
        .or_else(|| {
            choices
                .values()
                .find(|label| label.to_lowercase().starts_with("other"))
        })
        .cloned()
}

fn resolve_answer_ids(response: &mut Response, columns: &[Column]) {
    for column in columns.iter().filter(|c| c.kind.has_choices()) {
        let Some(answers) = response.answers.get(&column.id) else {
            continue;
        };
        let ids: IndexSet<ChoiceId> = answers.iter().filter_map(|a| column.resolve(a)).collect();
        if !ids.is_empty() {
            response.answer_ids.insert(column.id.clone(), ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_csv;

    const COLOURS: &str = "\
ResponseId,Finished,Q1,Q1_4_TEXT
Response ID,Finished,Favourite colour?,Favourite colour? - Other - Text
{\"ImportId\":\"_recordId\"},{\"ImportId\":\"finished\"},{\"ImportId\":\"QID1\"},{\"ImportId\":\"QID1_4_TEXT\"}
R1,1,Red,
R2,1,Blue,
R3,1,Red,
R4,1,Green,
";

    fn table(rows: &[&[&str]]) -> RawTable {
        let cells = |r: &[&str]| r.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        RawTable::new(cells(rows[0]), rows[1..].iter().map(|r| cells(r)).collect())
    }

    fn fruit() -> RawTable {
        table(&[
            &["ResponseId", "Finished", "Q2_1", "Q2_2", "Q2_3", "Q2_4", "Q2_4_TEXT"],
            &[
                "Response ID",
                "Finished",
                "Fruit? - Selected Choice - Apple",
                "Fruit? - Selected Choice - Pear",
                "Fruit? - Selected Choice - Plum",
                "Fruit? - Selected Choice - Other",
                "Fruit? - Other - Text",
            ],
            &[
                "{}",
                "{}",
                r#"{"ImportId":"QID2","choiceId":"1"}"#,
                r#"{"ImportId":"QID2","choiceId":"2"}"#,
                r#"{"ImportId":"QID2","choiceId":"3"}"#,
                r#"{"ImportId":"QID2","choiceId":"4"}"#,
                r#"{"ImportId":"QID2_4_TEXT"}"#,
            ],
            &["R1", "1", "Apple", "Pear", "", "", ""],
            &["R2", "0", "Apple", "", "", "", ""],
            &["R3", "True", "", "Pear", "", "Something else", "durian"],
            &["", "1", "Apple", "", "", "", ""],
        ])
    }

    fn parse_text(text: &str) -> Survey {
        parse(&read_csv(text).unwrap(), &ImportConfig::default()).unwrap()
    }

    fn parse_fruit() -> Survey {
        parse(&fruit(), &ImportConfig::default()).unwrap()
    }

    #[test]
    fn test_single_choice_ids_first_seen() {
        let survey = parse_text(COLOURS);
        let q1 = survey.column("Q1").unwrap();
        assert_eq!(q1.kind, QuestionType::Single);
        let choices: Vec<(ChoiceId, &str)> = q1.choices.iter().map(|(&id, l)| (id, l.as_str())).collect();
        assert_eq!(choices, vec![(1, "Red"), (2, "Blue"), (3, "Green")]);
        assert_eq!(q1.question_text, "Favourite colour?");
    }

    #[test]
    fn test_choice_ids_stable_across_parses() {
        let first = parse_text(COLOURS);
        for _ in 0..5 {
            assert_eq!(parse_text(COLOURS), first);
        }
        let first = parse_fruit();
        assert_eq!(parse_fruit(), first);
    }

    #[test]
    fn test_multiple_uses_declared_ids_and_first_responder_labels() {
        let survey = parse_fruit();
        let q2 = survey.column("Q2").unwrap();
        assert_eq!(q2.kind, QuestionType::Multiple);
        assert_eq!(q2.label(1), Some("Apple"));
        assert_eq!(q2.label(2), Some("Pear"));
        // Nobody picked Plum: label comes from the question text
        assert_eq!(q2.label(3), Some("Plum"));
        assert_eq!(q2.label(4), Some("Something else"));
        assert_eq!(q2.other_choice_label.as_deref(), Some("Something else"));
        assert_eq!(q2.question_text, "Fruit?");
    }

    #[test]
    fn test_incomplete_and_anonymous_rows_dropped() {
        let survey = parse_fruit();
        let ids: Vec<&str> = survey.responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R3"]);
    }

    #[test]
    fn test_answers_keep_column_order_and_resolve() {
        let survey = parse_fruit();
        let r3 = &survey.responses[1];
        assert_eq!(r3.answers["Q2"], vec!["Pear", "Something else", "durian"]);
        // "durian" falls back to the other choice and deduplicates with it
        let ids: Vec<ChoiceId> = r3.answer_ids["Q2"].iter().copied().collect();
        assert_eq!(ids, vec![2, 4]);

        let r1 = &survey.responses[0];
        let ids: Vec<ChoiceId> = r1.answer_ids["Q2"].iter().copied().collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_multitext_cleanup_drops_artifacts_and_empty_responses() {
        let text = "\
ResponseId,Q5_1_TEXT,Q5_2_TEXT
Response ID,Names - 1,Names - 2
{},{},{}
R1,Ann,# 2
R2,#1,#3
R3,Bob,Cy
";
        let survey = parse_text(text);
        assert_eq!(survey.column("Q5").unwrap().kind, QuestionType::Multitext);
        let ids: Vec<&str> = survey.responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R3"]);
        assert_eq!(survey.responses[0].answers["Q5"], vec!["Ann"]);
        assert!(survey.responses[0].answer_ids.is_empty());
    }

    #[test]
    fn test_missing_completed_column_keeps_all_rows() {
        let text = "ResponseId,Q1\nID,Colour?\n{},{}\nR1,Red\nR2,Blue\n";
        let survey = parse_text(text);
        assert_eq!(survey.responses.len(), 2);
    }

    #[test]
    fn test_unparsable_metadata_is_permissive() {
        let text = "ResponseId,Q1\nID,Colour?\n{},not json\nR1,Red\n";
        let survey = parse_text(text);
        assert_eq!(survey.column("Q1").unwrap().kind, QuestionType::Single);
    }

    #[test]
    fn test_structural_errors() {
        let cfg = ImportConfig::default();

        let empty = RawTable::default();
        assert!(matches!(parse(&empty, &cfg), Err(ImportError::Empty)));

        let no_id = read_csv("Q1\nColour?\n{}\nRed\n").unwrap();
        assert!(matches!(parse(&no_id, &cfg), Err(ImportError::MissingIdentifierColumn(ref c)) if c == "ResponseId"));

        let no_questions = read_csv("ResponseId,Age\nID,Age\n{},{}\nR1,30\n").unwrap();
        assert!(matches!(parse(&no_questions, &cfg), Err(ImportError::NoQuestionColumns)));

        let no_rows = read_csv("ResponseId,Finished,Q1\nID,Done,Colour?\n{},{},{}\nR1,0,Red\n").unwrap();
        assert!(matches!(parse(&no_rows, &cfg), Err(ImportError::NoResponses)));
    }
}
