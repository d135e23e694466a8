// Question type classification from the shape of a question's export columns.

use super::header::QuestionGroup;
use super::types::QuestionType;

/// Classify a question. Rules are checked in order:
///
/// 1. a single column marked free-text is TEXT;
/// 2. several free-text columns are MULTITEXT, or MULTIPLE_MULTITEXT when any
///    column carries a choice marker;
/// 3. fewer than three columns with no choice marker are SINGLE;
/// 4. anything else is MULTIPLE.
pub fn classify(group: &QuestionGroup) -> QuestionType {
    let total = group.columns.len();
    let free_text = group.free_text_columns().count();
    let any_marker = group.columns.iter().any(|c| c.has_choice_marker());

    if total == 1 && free_text == 1 {
        QuestionType::Text
    } else if free_text > 1 {
        if any_marker {
            QuestionType::MultipleMultitext
        } else {
            QuestionType::Multitext
        }
    } else if total < 3 && !any_marker {
        QuestionType::Single
    } else {
        QuestionType::Multiple
    }
}
