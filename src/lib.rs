// Library surface for the binary, headless integration tests, and reuse.
pub mod app_dirs;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod heatmap;
pub mod keymap;
pub mod metrics;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod time_series;
pub mod ui;

pub use error::{EngineError, Result};
pub use session::{Intent, Keystroke, SessionMachine, Signal, State};
