//! Takeoff core
//!
//! Session orchestration over the model and storage crates, plus CSV export.

pub mod export;
pub mod session;

pub use export::{export_line_items_csv, export_measurements_csv, CsvExportConfig, ExportError};
pub use session::{Prompter, ScriptedPrompter, SessionError, SessionEvent, TakeoffSession};
