//! Output types for frontend consumption.
//!
//! These structs are serialized to JSON and handed to the renderer, which
//! maps dots to visual elements keyed by `id`.

use serde::Serialize;

use crate::color::ColorScale;
use crate::layout::{Dot, Focus, LabelAnchor};
use crate::parser::{ChoiceId, Column, ImportError, QuestionType};
use crate::layout::LayoutError;

/// A positioned dot ready to draw
#[derive(Debug, Clone, Serialize)]
pub struct DotOutput {
    pub id: String,
    pub resp_id: String,
    pub layout_focus: ChoiceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_focus: Option<ChoiceId>,
    pub x: f64,
    pub y: f64,
    /// Fill colour from the colour column's scale
    pub fill: String,
}

impl DotOutput {
    pub fn new(dot: &Dot, scale: &ColorScale) -> Self {
        Self {
            id: dot.id.clone(),
            resp_id: dot.resp_id.clone(),
            layout_focus: dot.layout_focus,
            color_focus: dot.color_focus,
            x: dot.x.unwrap_or(0.0),
            y: dot.y.unwrap_or(0.0),
            fill: scale.color(dot.color_focus).to_string(),
        }
    }
}

/// A question the user can pick as layout or colour column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnOutput {
    pub id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// (choice id, label) in declaration order
    pub choices: Vec<(ChoiceId, String)>,
    /// Whether the column can drive layout or colour
    pub selectable: bool,
}

impl From<&Column> for ColumnOutput {
    fn from(c: &Column) -> Self {
        Self {
            id: c.id.clone(),
            question_text: c.question_text.clone(),
            kind: c.kind,
            choices: c.choices.iter().map(|(&id, l)| (id, l.clone())).collect(),
            selectable: c.kind.has_choices(),
        }
    }
}

/// Error information for the frontend
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Machine-readable error name
    pub kind: String,
    pub message: String,
}

impl From<&ImportError> for ErrorInfo {
    fn from(e: &ImportError) -> Self {
        Self { kind: e.kind().to_string(), message: e.to_string() }
    }
}

impl From<&LayoutError> for ErrorInfo {
    fn from(e: &LayoutError) -> Self {
        Self { kind: e.kind().to_string(), message: e.to_string() }
    }
}

/// Result of an import
#[derive(Debug, Clone, Serialize)]
pub struct SurveyOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnOutput>,
    pub response_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// The combined layout sent to the renderer
#[derive(Debug, Clone, Serialize)]
pub struct LayoutOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dots: Vec<DotOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub foci: Vec<Focus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelAnchor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl LayoutOutput {
    pub fn error(error: ErrorInfo) -> Self {
        Self { dots: vec![], foci: vec![], labels: vec![], error: Some(error) }
    }
}

/// Serialize for the frontend. Falls back to a bare error object.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!(%e, "failed to serialize output");
        r#"{"error":{"kind":"serialize","message":"failed to serialize output"}}"#.to_string()
    })
}
