//! Native orchestration of an import and its layouts.
//!
//! A `Session` owns the current survey together with everything derived from
//! it: the layout cache, the colour scales and the last dot set handed to the
//! renderer. Importing a new file replaces all of it at once and bumps the
//! session generation, so work started against the old survey can be told
//! apart from work on the new one.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use serde::Deserialize;

use crate::color::{ColorScale, CATEGORY10};
use crate::layout::{
    foci_for_column, generate, label_anchors, seed_positions, CanvasConfig, Dot, LayoutCache,
    LayoutError, PairKey, Simulation, SimulationConfig,
};
use crate::output::{DotOutput, LayoutOutput};
use crate::parser::{parse_csv, Column, ImportConfig, ImportError, QuestionType, Survey};

/// Space between the top of a focus' dot cloud and its label.
const LABEL_GAP: f64 = 12.0;

/// Everything a session can be configured with. Missing keys take defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub import: ImportConfig,
    pub canvas: CanvasConfig,
    pub simulation: SimulationConfig,
}

impl Config {
    /// Parse a (possibly partial) JSON object. Blank input gives the defaults.
    pub fn from_json(text: &str) -> Result<Config, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_json::from_str(text)
    }
}

/// A layout simulation started by `Session::start` that has not been stored yet.
/// Dropping it without `Session::complete` abandons the build.
#[derive(Debug)]
pub struct PendingLayout {
    key: PairKey,
    generation: u64,
    simulation: Simulation,
    /// Held while the build is alive; the session only keeps a weak handle.
    ticket: Arc<()>,
}

impl PendingLayout {
    pub fn key(&self) -> &PairKey {
        &self.key
    }

    /// Session generation the task was started in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance up to `max` steps, calling `on_tick(step, total)` before each
    /// one. Returns true when the run is finished.
    pub fn step_batch(&mut self, max: usize, mut on_tick: impl FnMut(usize, usize)) -> bool {
        for _ in 0..max {
            if self.simulation.is_finished() {
                break;
            }
            on_tick(self.simulation.current_step(), self.simulation.total_steps());
            self.simulation.step();
        }
        self.simulation.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.simulation.is_finished()
    }

    pub fn progress(&self) -> f64 {
        self.simulation.progress()
    }

    pub fn total_steps(&self) -> usize {
        self.simulation.total_steps()
    }
}

/// A `start` for a pair another task is already building.
#[derive(Debug)]
pub struct WaitingLayout {
    key: PairKey,
    generation: u64,
    ticket: Weak<()>,
}

impl WaitingLayout {
    pub fn key(&self) -> &PairKey {
        &self.key
    }

    /// Session generation the wait was started in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub enum Started {
    /// The pair was already laid out.
    Cached(Arc<[Dot]>),
    /// This caller builds the pair.
    Pending(PendingLayout),
    /// Another task builds the pair; `Session::poll` yields its result.
    Waiting(WaitingLayout),
}

#[derive(Debug)]
pub enum Poll {
    Ready(Arc<[Dot]>),
    /// The building task is still running.
    InFlight,
    /// The building task was dropped, or the session moved on. Start again.
    Gone,
}

#[derive(Debug, Default)]
pub struct Session {
    config: Config,
    survey: Option<Survey>,
    cache: LayoutCache,
    colors: HashMap<String, ColorScale>,
    generation: u64,
    last_shown: Option<Arc<[Dot]>>,
    in_flight: HashMap<PairKey, Weak<()>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn survey(&self) -> Option<&Survey> {
        self.survey.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cache(&self) -> &LayoutCache {
        &self.cache
    }

    /// Import CSV text, replacing the survey and everything derived from it.
    /// A failed import leaves the session as it was.
    pub fn import_csv(&mut self, text: &str) -> Result<&Survey, ImportError> {
        let survey = parse_csv(text, &self.config.import)?;

        self.colors = survey
            .columns
            .iter()
            .filter(|c| c.kind.has_choices())
            .map(|c| (c.id.clone(), ColorScale::for_column(c, CATEGORY10)))
            .collect();
        self.cache = LayoutCache::new();
        self.last_shown = None;
        self.in_flight.clear();
        self.generation += 1;

        tracing::debug!(
            generation = self.generation,
            columns = survey.columns.len(),
            responses = survey.responses.len(),
            "survey imported"
        );
        let survey: &Survey = self.survey.insert(survey);
        Ok(survey)
    }

    /// Change the canvas. Cached layouts were placed for the old size and are dropped.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.config.canvas = CanvasConfig { width, height };
        self.cache.clear();
        self.in_flight.clear();
        self.generation += 1;
        tracing::debug!(width, height, "canvas resized, layout cache cleared");
    }

    /// Columns that can drive layout or colour, in survey order.
    pub fn selectable_columns(&self) -> Vec<&Column> {
        self.survey
            .iter()
            .flat_map(|s| s.columns.iter())
            .filter(|c| c.kind.has_choices())
            .collect()
    }

    /// Columns of the named question type (e.g. `"MULTIPLE"`).
    pub fn columns_of_type(&self, kind: &str) -> Result<Vec<&Column>, LayoutError> {
        let kind: QuestionType = kind.parse()?;
        Ok(self
            .survey
            .iter()
            .flat_map(|s| s.columns.iter())
            .filter(|c| c.kind == kind)
            .collect())
    }

    pub fn color_scale(&self, column_id: &str) -> Option<&ColorScale> {
        self.colors.get(column_id)
    }

    fn pair(&self, color_id: &str, layout_id: &str) -> Result<(&Survey, &Column, &Column), LayoutError> {
        let survey = self.survey.as_ref().ok_or(LayoutError::NoSurvey)?;
        let find = |id: &str| {
            survey
                .column(id)
                .ok_or_else(|| LayoutError::UnknownColumn(id.to_string()))
        };
        Ok((survey, find(color_id)?, find(layout_id)?))
    }

    /// Dots and foci for the pair, seeded from the last shown layout, ready to run.
    fn prepare(&self, color_id: &str, layout_id: &str) -> Result<Simulation, LayoutError> {
        let (survey, color, layout) = self.pair(color_id, layout_id)?;
        let mut dots = generate(&survey.responses, layout, color)?;
        let layout_foci = foci_for_column(layout, &survey.responses, &self.config.canvas)?;
        let color_foci = foci_for_column(color, &survey.responses, &self.config.canvas)?;
        if let Some(previous) = &self.last_shown {
            seed_positions(&mut dots, previous);
        }
        Ok(Simulation::new(dots, &layout_foci, &color_foci, &self.config.simulation))
    }

    /// Settled dots for the pair. A cached layout is returned without running
    /// anything; otherwise the full simulation runs, calling
    /// `on_tick(step, total)` before each step, and the result is cached.
    pub fn layout(
        &mut self,
        color_id: &str,
        layout_id: &str,
        on_tick: impl FnMut(usize, usize),
    ) -> Result<Arc<[Dot]>, LayoutError> {
        let key = PairKey::new(color_id, layout_id);
        let dots = self
            .cache
            .get_or_compute_key(key, || {
                Ok::<_, LayoutError>(self.prepare(color_id, layout_id)?.run(on_tick))
            })?;
        self.last_shown = Some(dots.clone());
        Ok(dots)
    }

    /// Begin a layout that the caller advances itself. Cached pairs come back
    /// immediately. At most one task builds a pair at a time: later callers
    /// for the same pair get `Started::Waiting` until it is stored.
    pub fn start(&mut self, color_id: &str, layout_id: &str) -> Result<Started, LayoutError> {
        let key = PairKey::new(color_id, layout_id);
        if let Some(dots) = self.cache.get(&key) {
            return Ok(Started::Cached(dots));
        }
        if let Some(ticket) = self.in_flight.get(&key).filter(|t| t.strong_count() > 0) {
            tracing::debug!(color = %key.color, layout = %key.layout, "layout already in flight");
            let ticket = ticket.clone();
            return Ok(Started::Waiting(WaitingLayout { key, generation: self.generation, ticket }));
        }

        let simulation = self.prepare(color_id, layout_id)?;
        let ticket = Arc::new(());
        self.in_flight.insert(key.clone(), Arc::downgrade(&ticket));
        Ok(Started::Pending(PendingLayout { key, generation: self.generation, simulation, ticket }))
    }

    /// Result of the task a `Started::Waiting` is waiting on.
    pub fn poll(&self, waiting: &WaitingLayout) -> Poll {
        if waiting.generation != self.generation {
            return Poll::Gone;
        }
        if let Some(dots) = self.cache.get(&waiting.key) {
            return Poll::Ready(dots);
        }
        if waiting.ticket.strong_count() > 0 {
            Poll::InFlight
        } else {
            Poll::Gone
        }
    }

    /// Finish a pending layout, calling `on_tick(step, total)` before each
    /// remaining step, and store it. Returns None, storing nothing, when the
    /// session moved on to another import or canvas in the meantime.
    pub fn complete(
        &mut self,
        pending: PendingLayout,
        on_tick: impl FnMut(usize, usize),
    ) -> Option<Arc<[Dot]>> {
        if pending.generation != self.generation {
            tracing::debug!(
                started = pending.generation,
                current = self.generation,
                "discarding stale layout"
            );
            return None;
        }
        let PendingLayout { key, simulation, ticket, .. } = pending;
        let Ok(dots) = self
            .cache
            .get_or_compute_key(key.clone(), || Ok::<_, std::convert::Infallible>(simulation.run(on_tick)));
        if self.in_flight.get(&key).is_some_and(|t| t.ptr_eq(&Arc::downgrade(&ticket))) {
            self.in_flight.remove(&key);
        }
        self.last_shown = Some(dots.clone());
        Some(dots)
    }

    /// Renderer output for a laid-out pair: coloured dots, layout foci and labels.
    pub fn render(&self, color_id: &str, layout_id: &str, dots: &[Dot]) -> Result<LayoutOutput, LayoutError> {
        let (survey, color, layout) = self.pair(color_id, layout_id)?;
        let built;
        let scale = match self.colors.get(&color.id) {
            Some(scale) => scale,
            None => {
                built = ColorScale::for_column(color, CATEGORY10);
                &built
            }
        };
        let dot_radius = self.config.simulation.collision_radius / 2.0;

        Ok(LayoutOutput {
            dots: dots.iter().map(|d| DotOutput::new(d, scale)).collect(),
            foci: foci_for_column(layout, &survey.responses, &self.config.canvas)?,
            labels: label_anchors(dots, layout, dot_radius, LABEL_GAP),
            error: None,
        })
    }
}
