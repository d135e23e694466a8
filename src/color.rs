//! Fill colours for dots.
//!
//! A `ColorScale` maps the choices of one colour column to palette entries.
//! Scales are built explicitly for a column and owned by whoever owns the
//! survey, so they go away with it on re-import.

use indexmap::IndexMap;
use serde::Serialize;

use crate::parser::{ChoiceId, Column};

/// Ten category colours.
pub const CATEGORY10: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// Fill for dots without a colour answer.
pub const NO_ANSWER_COLOR: &str = "#cccccc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorScale {
    pub column: String,
    pub colors: IndexMap<ChoiceId, String>,
    pub fallback: String,
}

impl ColorScale {
    /// Assign palette entries to the column's choices in declaration order,
    /// wrapping around when there are more choices than colours.
    pub fn for_column(column: &Column, palette: &[&str]) -> Self {
        let palette = if palette.is_empty() { CATEGORY10 } else { palette };
        let colors = column
            .choices
            .keys()
            .zip(palette.iter().cycle())
            .map(|(&id, &color)| (id, color.to_string()))
            .collect();
        Self {
            column: column.id.clone(),
            colors,
            fallback: NO_ANSWER_COLOR.to_string(),
        }
    }

    pub fn color(&self, choice: Option<ChoiceId>) -> &str {
        choice
            .and_then(|c| self.colors.get(&c))
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::QuestionType;

    fn column(n: u32) -> Column {
        Column {
            id: "Q7".to_string(),
            question_text: String::new(),
            kind: QuestionType::Single,
            choices: (1..=n).map(|id| (id, format!("c{}", id))).collect(),
            other_choice_label: None,
        }
    }

    #[test]
    fn test_colors_follow_choice_order() {
        let scale = ColorScale::for_column(&column(3), CATEGORY10);
        assert_eq!(scale.color(Some(1)), "#1f77b4");
        assert_eq!(scale.color(Some(3)), "#2ca02c");
        assert_eq!(scale.color(None), NO_ANSWER_COLOR);
        assert_eq!(scale.color(Some(99)), NO_ANSWER_COLOR);
    }

    #[test]
    fn test_palette_wraps() {
        let scale = ColorScale::for_column(&column(3), &["#000", "#fff"]);
        assert_eq!(scale.color(Some(3)), "#000");
    }

    #[test]
    fn test_empty_palette_uses_default() {
        let scale = ColorScale::for_column(&column(1), &[]);
        assert_eq!(scale.color(Some(1)), CATEGORY10[0]);
    }
}
