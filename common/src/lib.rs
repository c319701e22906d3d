//! This library is there to share some common code amongst all tempo modules.
//!

mod interp;
mod logging;
mod position;
mod units;

use clap::{crate_name, crate_version};

pub use interp::*;
pub use logging::*;
pub use position::*;
pub use units::*;

const NAME: &str = crate_name!();
const VERSION: &str = crate_version!();

pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}
