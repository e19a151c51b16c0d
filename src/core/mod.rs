// Public modules
pub mod config;
pub mod cookbook;
pub mod error;
pub mod git;
pub mod hooks;
pub mod pipeline;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
