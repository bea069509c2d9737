//! Wire types for the signage control surface.
//!
//! This crate contains the serde-serializable types exchanged between the
//! display session orchestrator and whatever drives it (the control daemon,
//! an admin page, a test harness). They are pure data: no behavior beyond
//! parsing, formatting and serialization.
//!
//! Higher-level behavior lives in `signage-core`.

pub mod control;
pub mod mode;
pub mod status;

pub use control::*;
pub use mode::*;
pub use status::*;
