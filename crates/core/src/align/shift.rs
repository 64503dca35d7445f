//! Per-track pitch-shift planning with role-based clamping.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::align::key::semitone_distance;
use crate::types::{Key, StemRole};

/// How far vocals may be shifted before formant artifacts get ugly.
pub const DEFAULT_VOCAL_SHIFT_LIMIT: i32 = 3;
/// Instrumental stems tolerate more before sounding wrong.
pub const DEFAULT_MUSIC_SHIFT_LIMIT: i32 = 6;

/// Raw per-track semitone shifts plus the role clamp limits.
///
/// The raw shift is applied through [`ShiftPlan::applied_shift`], which
/// clamps to the vocal or instrumental limit depending on the stem role.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftPlan {
    pub shifts: BTreeMap<String, i32>,
    pub vocal_limit: i32,
    pub music_limit: i32,
}

impl ShiftPlan {
    /// Clamped shift for one stem of one track. Unknown tracks shift by 0.
    pub fn applied_shift(&self, track_id: &str, role: StemRole) -> i32 {
        let raw = self.shifts.get(track_id).copied().unwrap_or(0);
        let limit = if role.is_vocal() {
            self.vocal_limit
        } else {
            self.music_limit
        };
        raw.clamp(-limit, limit)
    }
}

/// Compute the semitone shift that moves each track's key to the target.
///
/// Precondition: the caller supplies valid keys for every track it will
/// render; there is no internal recovery for malformed analysis.
pub fn plan_shifts(per_track_keys: &BTreeMap<String, Key>, target: Key) -> ShiftPlan {
    plan_shifts_with_limits(
        per_track_keys,
        target,
        DEFAULT_VOCAL_SHIFT_LIMIT,
        DEFAULT_MUSIC_SHIFT_LIMIT,
    )
}

pub fn plan_shifts_with_limits(
    per_track_keys: &BTreeMap<String, Key>,
    target: Key,
    vocal_limit: i32,
    music_limit: i32,
) -> ShiftPlan {
    let shifts = per_track_keys
        .iter()
        .map(|(track_id, &key)| {
            let shift = semitone_distance(key, target);
            if shift != 0 {
                log::debug!("track {}: {} -> {} ({:+} st)", track_id, key, target, shift);
            }
            (track_id.clone(), shift)
        })
        .collect();

    ShiftPlan {
        shifts,
        vocal_limit,
        music_limit,
    }
}
