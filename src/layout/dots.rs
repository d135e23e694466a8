// Dot generation: responses -> dots for one (layout, colour) column pair.
//
// Fan-out rule, per response with at least one layout answer:
// - no colour answer, or layout == colour: one dot per layout answer,
//   id `resp:layoutCol_layoutAns`
// - otherwise one dot per (layout answer, colour answer). The first colour
//   answer's dot is the primary dot `resp:colorCol_colorAns`; later colour
//   answers get `resp:colorCol_colorAns|layoutCol_layoutAns`.
//
// Primary ids do not mention the layout column, so a renderer sees them as
// the same entity across layout changes. Suffixed ids only exist for the
// current layout column.

use std::collections::HashMap;

use serde::Serialize;

use crate::parser::{ChoiceId, Column, Response};
use super::{ensure_choices, LayoutError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dot {
    pub id: String,
    pub resp_id: String,
    pub layout_focus: ChoiceId,
    /// None when the respondent did not answer the colour column.
    pub color_focus: Option<ChoiceId>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub vx: Option<f64>,
    pub vy: Option<f64>,
}

impl Dot {
    fn new(id: String, resp_id: &str, layout_focus: ChoiceId, color_focus: Option<ChoiceId>) -> Self {
        Self {
            id,
            resp_id: resp_id.to_string(),
            layout_focus,
            color_focus,
            x: None,
            y: None,
            vx: None,
            vy: None,
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

/// Expand responses into dots. Output order follows response order, then
/// layout answer order, then colour answer order.
pub fn generate(responses: &[Response], layout: &Column, color: &Column) -> Result<Vec<Dot>, LayoutError> {
    ensure_choices(layout)?;
    ensure_choices(color)?;

    let same_column = layout.id == color.id;
    let mut dots = Vec::new();

    for response in responses {
        let Some(layout_ids) = response.answer_ids_for(&layout.id) else {
            continue;
        };
        let color_ids = if same_column {
            None
        } else {
            response.answer_ids_for(&color.id)
        };

        for &layout_ans in layout_ids {
            match color_ids {
                None => {
                    let id = format!("{}:{}_{}", response.id, layout.id, layout_ans);
                    let color_focus = same_column.then_some(layout_ans);
                    dots.push(Dot::new(id, &response.id, layout_ans, color_focus));
                }
                Some(color_ids) => {
                    for (j, &color_ans) in color_ids.iter().enumerate() {
                        let id = if j == 0 {
                            format!("{}:{}_{}", response.id, color.id, color_ans)
                        } else {
                            format!(
                                "{}:{}_{}|{}_{}",
                                response.id, color.id, color_ans, layout.id, layout_ans
                            )
                        };
                        dots.push(Dot::new(id, &response.id, layout_ans, Some(color_ans)));
                    }
                }
            }
        }
    }

    tracing::debug!(
        layout = %layout.id,
        color = %color.id,
        dots = dots.len(),
        "generated dots"
    );
    Ok(dots)
}

/// Start dots from the coordinates of same-id dots in a previously shown set.
/// Dots without a match keep their current (usually empty) position.
pub fn seed_positions(dots: &mut [Dot], previous: &[Dot]) {
    let mut known: HashMap<&str, (f64, f64)> = HashMap::new();
    for dot in previous {
        if let Some(pos) = dot.position() {
            known.entry(dot.id.as_str()).or_insert(pos);
        }
    }

    for dot in dots.iter_mut() {
        if let Some(&(x, y)) = known.get(dot.id.as_str()) {
            dot.x = Some(x);
            dot.y = Some(y);
        }
    }
}
