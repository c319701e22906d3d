//! All sub-command handlers.
//!

mod analyze;
mod export;
mod speeds;
mod validate;

pub use analyze::*;
pub use export::*;
pub use speeds::*;
pub use validate::*;
