//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Process execution behind the `ProcessRunner` trait
//! - `io` - File I/O with consistent error handling
//! - `parser` - Text extraction
//! - `shell` - Shell quoting for display

pub mod command;
pub mod io;
pub mod parser;
pub mod shell;
