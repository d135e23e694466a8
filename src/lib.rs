//! swarm-core: survey import and force-directed dot layout.
//!
//! A survey export (CSV) is parsed into questions and responses. Any two
//! choice questions can then be laid out as a swarm: one dot per answer,
//! clustered around the layout question's choices and then drifting toward
//! the colour question's choices.

pub mod color;
pub mod layout;
pub mod output;
pub mod parser;
pub mod session;
mod wasm;

pub use layout::{CanvasConfig, Dot, LayoutError, SimulationConfig};
pub use parser::{Column, ImportConfig, ImportError, QuestionType, Response, Survey};
pub use session::{Config, Session};
pub use wasm::{SimulationTask, WasmSession};
