//! Terminal frontend.
//!
//! Runs a program in the terminal with:
//! - Half-block rendering of the 64x32 screen
//! - Keypad input on the `1234/qwer/asdf/zxcv` block
//! - Debug overlay with registers, trace history and breakpoints

mod app;
mod terminal;
mod ui;

pub use app::{run_tui, EmulatorApp};
pub use terminal::{Control, TerminalKeys, TerminalScreen, TraceLog};
