//! Library portion of the `tempoctl` driver: CLI definitions and the
//! sub-command handlers.
//!

pub mod cli;
pub mod cmds;

pub use cli::*;
pub use cmds::*;
