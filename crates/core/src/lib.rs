//! stemweld-core: beat-grid alignment and mashup rendering.
//!
//! Takes per-track analysis (key, BPM, beat timestamps), separated stems,
//! and a declarative masterplan, and renders one continuous mix: every stem
//! is conformed to a shared tempo grid, pitch-shifted toward a common key
//! within per-role limits, layered per section, and joined with S-curve
//! crossfades.
//!
//! The crate is deliberately collaborator-free: stem separation, beat/key
//! analysis, and plan generation happen upstream; this crate is the pure
//! render stage that turns their outputs into audio.

pub mod align;
pub mod audio;
pub mod error;
pub mod mix;
pub mod types;

pub use error::{RenderError, Result};
