//! Control command handlers
//!
//! `controls` holds the start/stop/status handlers; `console` reads them
//! from a line-based input.

pub mod console;
pub mod controls;

pub use console::{run_console, ControlCommand};
pub use controls::{get_cameras, start_recording, stop_recording, ControlState};
