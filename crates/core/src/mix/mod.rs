//! Section mixing, transitions, and the top-level render pipeline.

pub mod process;
pub mod section;
pub mod transitions;
