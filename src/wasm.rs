//! WASM bindings for the swarm-core library.
//!
//! Everything exposed to JavaScript via wasm-bindgen is defined here. Results
//! cross the boundary as JSON strings built from the `output` types.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use wasm_bindgen::prelude::*;

use crate::layout::{step_count, Dot, LayoutError};
use crate::output::{to_json, ColumnOutput, ErrorInfo, LayoutOutput, SurveyOutput};
use crate::session::{self, Config, PendingLayout, Poll, Started, WaitingLayout};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    pub fn console_log(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = error)]
    pub fn console_error(s: &str);
}

fn layout_error_json(e: &LayoutError) -> String {
    console_error(&format!("Layout error: {}", e));
    to_json(&LayoutOutput::error(ErrorInfo::from(e)))
}

fn render_json(session: &session::Session, color_id: &str, layout_id: &str, dots: &[Dot]) -> String {
    match session.render(color_id, layout_id, dots) {
        Ok(out) => to_json(&out),
        Err(e) => layout_error_json(&e),
    }
}

#[wasm_bindgen(js_name = Session)]
pub struct WasmSession {
    inner: Rc<RefCell<session::Session>>,
}

#[wasm_bindgen(js_class = Session)]
impl WasmSession {
    /// `config_json` may be empty or a partial config object.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> WasmSession {
        let config = Config::from_json(config_json).unwrap_or_else(|e| {
            console_error(&format!("Invalid config, using defaults: {}", e));
            Config::default()
        });
        WasmSession { inner: Rc::new(RefCell::new(session::Session::new(config))) }
    }

    /// Import a survey export. Returns the columns, or an error object.
    #[wasm_bindgen(js_name = importCsv)]
    pub fn import_csv(&self, text: &str) -> String {
        let mut session = self.inner.borrow_mut();
        let output = match session.import_csv(text) {
            Ok(survey) => SurveyOutput {
                columns: survey.columns.iter().map(ColumnOutput::from).collect(),
                response_count: survey.responses.len(),
                error: None,
            },
            Err(e) => {
                console_error(&format!("Error importing survey: {}", e));
                SurveyOutput { columns: vec![], response_count: 0, error: Some(ErrorInfo::from(&e)) }
            }
        };
        to_json(&output)
    }

    /// Columns of the current survey.
    pub fn columns(&self) -> String {
        let session = self.inner.borrow();
        let output = SurveyOutput {
            columns: session
                .survey()
                .map(|s| s.columns.iter().map(ColumnOutput::from).collect())
                .unwrap_or_default(),
            response_count: session.survey().map_or(0, |s| s.responses.len()),
            error: None,
        };
        to_json(&output)
    }

    /// Columns of one question type, e.g. `"MULTIPLE"`.
    #[wasm_bindgen(js_name = columnsOfType)]
    pub fn columns_of_type(&self, kind: &str) -> String {
        let session = self.inner.borrow();
        match session.columns_of_type(kind) {
            Ok(columns) => {
                let columns: Vec<ColumnOutput> = columns.into_iter().map(ColumnOutput::from).collect();
                to_json(&columns)
            }
            Err(e) => layout_error_json(&e),
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.inner.borrow_mut().resize(width, height);
    }

    /// Lay out a pair synchronously, running the whole simulation if needed.
    pub fn layout(&self, color_id: &str, layout_id: &str) -> String {
        let mut session = self.inner.borrow_mut();
        match session.layout(color_id, layout_id, |_, _| {}) {
            Ok(dots) => render_json(&session, color_id, layout_id, &dots),
            Err(e) => layout_error_json(&e),
        }
    }

    /// Start a layout that JS advances with `SimulationTask.step`, e.g. once
    /// per animation frame. Dropping the task abandons it. Starting a pair
    /// that another task is building yields a task that waits for that one.
    #[wasm_bindgen(js_name = startLayout)]
    pub fn start_layout(&self, color_id: &str, layout_id: &str) -> SimulationTask {
        let mut session = self.inner.borrow_mut();
        let sim = &session.config().simulation;
        let total_steps = step_count(sim.alpha_decay, sim.alpha_min);
        let state = TaskState::started(session.start(color_id, layout_id));
        drop(session);
        SimulationTask {
            session: Rc::clone(&self.inner),
            color_id: color_id.to_string(),
            layout_id: layout_id.to_string(),
            total_steps,
            state,
        }
    }
}

enum TaskState {
    Running(PendingLayout),
    /// Another task is building the same pair.
    Waiting(WaitingLayout),
    /// None when the session moved on before the task finished.
    Done(Option<Arc<[Dot]>>),
    /// Error JSON from starting the task.
    Failed(String),
}

impl TaskState {
    fn started(started: Result<Started, LayoutError>) -> TaskState {
        match started {
            Ok(Started::Cached(dots)) => TaskState::Done(Some(dots)),
            Ok(Started::Pending(pending)) => TaskState::Running(pending),
            Ok(Started::Waiting(waiting)) => TaskState::Waiting(waiting),
            Err(e) => TaskState::Failed(layout_error_json(&e)),
        }
    }
}

#[wasm_bindgen]
pub struct SimulationTask {
    session: Rc<RefCell<session::Session>>,
    color_id: String,
    layout_id: String,
    total_steps: usize,
    state: TaskState,
}

#[wasm_bindgen]
impl SimulationTask {
    /// Advance up to `batch` steps. Returns true once the task is done.
    pub fn step(&mut self, batch: usize) -> bool {
        match &mut self.state {
            TaskState::Running(pending) => {
                if pending.step_batch(batch, |_, _| {}) {
                    self.settle();
                }
            }
            TaskState::Waiting(_) => self.settle(),
            _ => {}
        }
        !matches!(self.state, TaskState::Running(_) | TaskState::Waiting(_))
    }

    pub fn progress(&self) -> f64 {
        match &self.state {
            TaskState::Running(pending) => pending.progress(),
            TaskState::Waiting(_) => 0.0,
            _ => 1.0,
        }
    }

    #[wasm_bindgen(js_name = totalSteps)]
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Layout JSON. Finishes the remaining steps first if needed.
    pub fn result(&mut self) -> String {
        self.settle();
        if matches!(self.state, TaskState::Running(_)) {
            // a waiting task took over an abandoned build
            self.settle();
        }
        match &self.state {
            TaskState::Done(Some(dots)) => {
                render_json(&self.session.borrow(), &self.color_id, &self.layout_id, dots)
            }
            TaskState::Done(None) => {
                console_log("Discarding layout started before the last import");
                to_json(&LayoutOutput::error(ErrorInfo {
                    kind: "stale".to_string(),
                    message: "the survey changed while this layout was running".to_string(),
                }))
            }
            TaskState::Failed(json) => json.clone(),
            // only a task waiting on another one is left unsettled
            TaskState::Running(_) | TaskState::Waiting(_) => to_json(&LayoutOutput::error(ErrorInfo {
                kind: "unfinished".to_string(),
                message: "layout is still running".to_string(),
            })),
        }
    }
}

impl SimulationTask {
    /// Finish a running build, or pick up the result a waiting task depends on.
    /// A waiting task whose builder was dropped starts its own build.
    fn settle(&mut self) {
        let state = std::mem::replace(&mut self.state, TaskState::Done(None));
        let mut session = self.session.borrow_mut();
        self.state = match state {
            TaskState::Running(pending) => TaskState::Done(session.complete(pending, |_, _| {})),
            TaskState::Waiting(waiting) => match session.poll(&waiting) {
                Poll::Ready(dots) => TaskState::Done(Some(dots)),
                Poll::InFlight => TaskState::Waiting(waiting),
                Poll::Gone if waiting.generation() == session.generation() => {
                    TaskState::started(session.start(&self.color_id, &self.layout_id))
                }
                Poll::Gone => TaskState::Done(None),
            },
            other => other,
        };
    }
}
