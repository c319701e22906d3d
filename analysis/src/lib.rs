//! Jump-phase analysis over parsed Tempo flight logs.
//!
//! This crate sits on top of `tempo-sentences`: the [`analyze_buffer`]
//! adapter drives a reader over a whole log buffer and projects the result
//! into aligned time series, the event detector locates exit, deployment
//! and landing, the velocity binner produces the density-calibrated
//! fall-rate distribution, and the projector derives per-sample glide and
//! touchdown estimates via the ellipsoidal traverse.
//!
//! Everything here is pure and synchronous: buffers in, structures out.
//!

mod derive;
mod events;
mod geodesy;
mod speeds;
mod track;

pub use derive::*;
pub use events::*;
pub use geodesy::*;
pub use speeds::*;
pub use track::*;

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
