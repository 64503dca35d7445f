//! Render pipeline error taxonomy.
//!
//! Inputs are assumed pre-validated by upstream collaborators; anything that
//! still fails here aborts the whole render. Degenerate slices and silent
//! buffers are recoverable conditions handled locally, not errors.

use thiserror::Error;

use crate::types::StemRole;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Alignment needs at least one beat interval on each side.
    #[error("beat grid too short: need at least 2 beats, got {got}")]
    InsufficientBeats { got: usize },

    /// Malformed or empty masterplan.
    #[error("invalid masterplan: {0}")]
    InvalidPlan(String),

    /// The plan references a track the caller did not supply.
    #[error("plan references unknown track {track_id:?}")]
    MissingTrack { track_id: String },

    /// The plan references a stem the caller did not supply for a track.
    #[error("no {role} stem provided for track {track_id:?}")]
    MissingStem { track_id: String, role: StemRole },
}

pub type Result<T> = std::result::Result<T, RenderError>;
