//! Labor-time compliance engine for transport fleets.
//!
//! Duty records flow in from timecard exports, get folded into daily
//! summaries, graded against rolling regulatory windows, and reconciled
//! into deduplicated alerts. A live projection answers "who is on shift
//! and how close to the line" without touching persisted state.

pub mod compliance;
pub mod config;
pub mod error;
pub mod telemetry;
