//! Git synchronization driven through the external `git` binary.
//!
//! - `locator` - repository membership and submodule nesting
//! - `sync` - pull, submodule pull, add, commit, push, tag
//! - `plugin` - the lifecycle hooks that sequence those operations

mod locator;
mod plugin;
mod sync;

pub use locator::*;
pub use plugin::*;
pub use sync::*;
