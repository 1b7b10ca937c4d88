//! The flowmeter accumulator
//!
//! This library tracks the cumulative volume passed through a pulse flow sensor
//! and derives a recent flow rate from a bounded, time-ordered history of
//! running totals. The core structure is [`Accumulator`]. A caller-owned sensor
//! driver feeds it increments through [`Accumulator::update`] and any number of
//! readers ask for [`Accumulator::total`] or [`Accumulator::flow`] at any time.
//!
//! Totals are kept internally in sub-units, [`UNIT_SCALE`] of them to one
//! display unit, to avoid floating point accumulation error. All results
//! reported to callers are in whole display units or display units per minute.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

mod accumulator;
pub mod builder;
pub mod clock;
pub mod config;
mod dispatch;
mod history;
mod sync;

pub use accumulator::{Accumulator, ChangeHook, Usage, UsageHook};
pub use builder::AccumulatorBuilder;
pub use clock::{Clock, ManualClock, RealClock};
pub use config::Config;
pub use history::Sample;

/// The number of sub-units that make up one display unit.
///
/// A pulse sensor that reports thousandths of a gallon, say, feeds the
/// accumulator in sub-units and reads back whole gallons.
pub const UNIT_SCALE: u64 = 1_000;

/// Errors produced by [`Accumulator`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A flow rate was requested over a zero-length window.
    #[error("flow window must be non-zero")]
    ZeroWindow,
}
