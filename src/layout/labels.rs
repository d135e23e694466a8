// Label anchors for layout foci.
//
// A focus label sits centred above the bounding box of the dots that were
// pulled toward it, so it follows where the dots actually settled rather
// than the nominal focus point.

use indexmap::IndexMap;
use serde::Serialize;

use crate::parser::{ChoiceId, Column};
use super::{Dot, RectF};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelAnchor {
    pub focus: ChoiceId,
    pub label: String,
    /// Box around the dots' extents (centres grown by `dot_radius`).
    pub bounds: RectF,
    pub x: f64,
    pub y: f64,
    pub count: usize,
}

/// One anchor per layout focus that has positioned dots, in the column's
/// choice order. `gap` is the distance between the box top and the label.
pub fn label_anchors(dots: &[Dot], column: &Column, dot_radius: f64, gap: f64) -> Vec<LabelAnchor> {
    let mut boxes: IndexMap<ChoiceId, (RectF, usize)> = IndexMap::new();
    for dot in dots {
        let Some((x, y)) = dot.position() else {
            continue;
        };
        let r = RectF::at_point(x, y);
        boxes
            .entry(dot.layout_focus)
            .and_modify(|(bb, n)| {
                *bb = bb.union(&r);
                *n += 1;
            })
            .or_insert((r, 1));
    }

    column
        .choices
        .iter()
        .filter_map(|(&id, label)| {
            let &(bb, count) = boxes.get(&id)?;
            let bounds = bb.inflate(dot_radius);
            Some(LabelAnchor {
                focus: id,
                label: label.clone(),
                bounds,
                x: bounds.center_x(),
                y: bounds.y - gap,
                count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::QuestionType;

    fn placed(id: &str, focus: ChoiceId, x: f64, y: f64) -> Dot {
        Dot {
            id: id.to_string(),
            resp_id: id.to_string(),
            layout_focus: focus,
            color_focus: None,
            x: Some(x),
            y: Some(y),
            vx: None,
            vy: None,
        }
    }

    #[test]
    fn test_label_anchor_from_dot_bounds() {
        let mut choices = IndexMap::new();
        choices.insert(2, "Blue".to_string());
        choices.insert(1, "Red".to_string());
        choices.insert(3, "Green".to_string());
        let column = Column {
            id: "Q1".to_string(),
            question_text: String::new(),
            kind: QuestionType::Single,
            choices,
            other_choice_label: None,
        };
        let dots = vec![
            placed("a", 1, 10.0, 50.0),
            placed("b", 1, 30.0, 70.0),
            placed("c", 2, 200.0, 100.0),
        ];

        let anchors = label_anchors(&dots, &column, 5.0, 10.0);
        assert_eq!(anchors.len(), 2);

        // choice order: Blue before Red, Green has no dots
        assert_eq!(anchors[0].label, "Blue");
        assert_eq!(anchors[1].label, "Red");

        let red = &anchors[1];
        assert_eq!(red.bounds, RectF { x: 5.0, y: 45.0, w: 30.0, h: 30.0 });
        assert_eq!((red.x, red.y), (20.0, 35.0));
        assert_eq!(red.count, 2);
    }
}
