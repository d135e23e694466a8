//! Foci grid placement.
//!
//! Answer choices are laid out row-major on a square-ish grid: with `n`
//! choices there are `ceil(sqrt(n))` slots per row and as many row slots.
//! Rows are spread evenly over the canvas height and each row's items evenly
//! over the width. Coordinates are rounded up to whole pixels.
//!
//! Placement is a pure function of (choice order, width, height). Callers
//! recompute it whenever the canvas size or the active choice set changes.

use indexmap::IndexMap;
use serde::Serialize;

use crate::parser::{ChoiceId, Column, Response};
use super::{ensure_choices, CanvasConfig, LayoutError};

/// Attraction target for one answer choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Focus {
    pub id: ChoiceId,
    pub label: String,
    pub x: i32,
    pub y: i32,
}

/// Place choices on the grid, in the given order.
pub fn place(choices: &IndexMap<ChoiceId, String>, width: f64, height: f64) -> Vec<Focus> {
    let n = choices.len();
    if n == 0 {
        return Vec::new();
    }

    let per_row = (n as f64).sqrt().ceil() as usize;
    let num_rows = per_row;
    let entries: Vec<(&ChoiceId, &String)> = choices.iter().collect();

    let mut foci = Vec::with_capacity(n);
    for (i, row) in entries.chunks(per_row).enumerate() {
        let k = row.len();
        let y = (height / (num_rows + 1) as f64 * (i + 1) as f64).ceil() as i32;
        for (j, &(&id, label)) in row.iter().enumerate() {
            let x = (width / (k + 1) as f64 * (j + 1) as f64).ceil() as i32;
            foci.push(Focus { id, label: label.clone(), x, y });
        }
    }
    foci
}

/// Choices of `column` that at least one response resolved to, in declaration order.
pub fn active_choices(column: &Column, responses: &[Response]) -> IndexMap<ChoiceId, String> {
    column
        .choices
        .iter()
        .filter(|&(id, _)| {
            responses
                .iter()
                .any(|r| r.answer_ids_for(&column.id).is_some_and(|ids| ids.contains(id)))
        })
        .map(|(&id, label)| (id, label.clone()))
        .collect()
}

/// Foci for the active choices of a column on the given canvas.
pub fn foci_for_column(
    column: &Column,
    responses: &[Response],
    canvas: &CanvasConfig,
) -> Result<Vec<Focus>, LayoutError> {
    ensure_choices(column)?;
    let active = active_choices(column, responses);
    Ok(place(&active, canvas.width, canvas.height))
}
