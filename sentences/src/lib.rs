//! Sentence grammar and stateful log reader for the Tempo flight-data recorder.
//!
//! The device emits a line-oriented stream: standard satellite-navigation
//! sentences (RMC/VTG/GGA) interleaved with a proprietary `PTMP` family
//! carrying barometric, inertial and housekeeping samples. This crate owns
//! the grammar ([`Sentence`]), the checksum repair for the tags the firmware
//! emits bare ([`repair_line`]), and the [`LogReader`] state machine that
//! fuses the stream into a sequence of [`FixEntry`] values plus a barometric
//! sample series.
//!
//! To add a new proprietary sentence, extend [`Tag`] and [`Sentence`] and add
//! the corresponding arm in the reader — the dispatch is a closed match, so
//! the compiler points at every spot that needs attention.
//!

mod checksum;
mod error;
mod fix;
mod reader;
mod sentence;

pub use checksum::*;
pub use error::*;
pub use fix::*;
pub use reader::*;
pub use sentence::*;

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
