// Dot layout for a (layout question, colour question) pair.
//
// Pipeline:
// - foci: grid position per active answer choice
// - dots: fan responses out into dots with stable ids
// - force: collision + foci attraction, two phases keyed by alpha
// - cache: finished dot sets per question pair
// - labels: label anchors from the bounding box of each focus' dots
//
// Submodules:
// - spatial_grid: neighbour lookup for the collision force

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::QuestionType;

mod cache;
mod dots;
mod foci;
mod force;
mod labels;
mod spatial_grid;

pub use cache::{LayoutCache, PairKey};
pub use dots::{generate, seed_positions, Dot};
pub use foci::{active_choices, foci_for_column, place, Focus};
pub use force::{simulate, step_count, Phase, Simulation, Tick};
pub use labels::{label_anchors, LabelAnchor};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("no survey has been imported")]
    NoSurvey,
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("unknown question type `{0}`")]
    UnknownQuestionType(String),
    #[error("column `{column}` is {kind} and has no answer choices")]
    UnsupportedQuestionType { column: String, kind: QuestionType },
}

impl LayoutError {
    pub fn kind(&self) -> &'static str {
        match self {
            LayoutError::NoSurvey => "no_survey",
            LayoutError::UnknownColumn(_) => "unknown_column",
            LayoutError::UnknownQuestionType(_) => "unknown_question_type",
            LayoutError::UnsupportedQuestionType { .. } => "unsupported_question_type",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl RectF {
    pub fn at_point(x: f64, y: f64) -> RectF {
        RectF { x, y, w: 0.0, h: 0.0 }
    }

    pub fn right(&self) -> f64 { self.x + self.w }
    pub fn bottom(&self) -> f64 { self.y + self.h }

    pub fn center_x(&self) -> f64 { self.x + self.w / 2.0 }

    pub fn union(&self, other: &RectF) -> RectF {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        RectF { x: x0, y: y0, w: x1 - x0, h: y1 - y0 }
    }

    /// Grow by `r` on every side.
    pub fn inflate(&self, r: f64) -> RectF {
        RectF { x: self.x - r, y: self.y - r, w: self.w + 2.0 * r, h: self.h + 2.0 * r }
    }
}

/// Drawing area the foci grid is laid out in.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 900.0, height: 530.0 }
    }
}

/// What dots without a colour answer do once the simulation cools into the
/// recolouring phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colorless {
    /// Pulled toward the canvas origin (0, 0). Matches the historical layout.
    #[default]
    OriginPull,
    /// No attraction; the dot keeps drifting under collision only.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fraction of the remaining heat removed per step.
    pub alpha_decay: f64,
    /// The run stops once alpha would fall below this.
    pub alpha_min: f64,
    pub alpha_target: f64,
    /// Friction: velocities are scaled by `1 - velocity_decay` each step.
    pub velocity_decay: f64,
    /// Alpha at or above this pulls toward layout foci, below it toward colour foci.
    pub phase_threshold: f64,
    pub foci_strength: f64,
    /// Minimum distance between dot centres.
    pub collision_radius: f64,
    pub collision_strength: f64,
    pub colorless: Colorless,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha_decay: 0.02,
            alpha_min: 0.001,
            alpha_target: 0.0,
            velocity_decay: 0.4,
            phase_threshold: 0.45,
            foci_strength: 0.1,
            collision_radius: 5.0,
            collision_strength: 0.7,
            colorless: Colorless::OriginPull,
        }
    }
}

/// Layout and colour columns must carry choices.
pub fn ensure_choices(column: &crate::parser::Column) -> Result<(), LayoutError> {
    if column.kind.has_choices() {
        Ok(())
    } else {
        Err(LayoutError::UnsupportedQuestionType {
            column: column.id.clone(),
            kind: column.kind,
        })
    }
}

/// Round to two decimals.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
