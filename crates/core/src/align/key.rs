//! Key distance arithmetic and target-key selection.

use crate::types::{Key, Mode};

/// Signed semitone distance from `src` to `dst` on the 12-tone circle,
/// always in [-6, 6].
///
/// Only pitch classes are compared; mode differences are charged separately
/// as a selection penalty. Of the upward and downward paths the one with
/// the smaller magnitude wins; at the exact tritone (both paths are 6) the
/// upward direction is chosen, so the result is +6, never -6.
pub fn semitone_distance(src: Key, dst: Key) -> i32 {
    let s = src.pitch_class() as i32;
    let d = dst.pitch_class() as i32;
    let up = (d - s).rem_euclid(12);
    let down = -((s - d).rem_euclid(12));
    if up.abs() <= down.abs() {
        up
    } else {
        down
    }
}

/// Choose the target key for a set of input keys.
///
/// Candidates are the distinct input keys in first-seen order; the winner
/// minimizes `Σ |semitone_distance(input, candidate)| + mode mismatches`.
/// Ties go to the earliest-seen candidate, which keeps the choice
/// deterministic regardless of how callers assembled the list. An empty
/// input returns C major rather than failing; callers should treat an empty
/// track set as their own bug upstream.
pub fn choose_target_key(keys: &[Key]) -> Key {
    let mut candidates: Vec<Key> = Vec::new();
    for &k in keys {
        if !candidates.contains(&k) {
            candidates.push(k);
        }
    }

    let mut best: Option<(Key, i64)> = None;
    for &cand in &candidates {
        let mut cost: i64 = 0;
        for &k in keys {
            cost += semitone_distance(k, cand).abs() as i64;
            if k.mode() != cand.mode() {
                cost += 1;
            }
        }
        // Strict less-than keeps the first-seen candidate on ties
        if best.map(|(_, c)| cost < c).unwrap_or(true) {
            best = Some((cand, cost));
        }
    }

    match best {
        Some((key, cost)) => {
            log::debug!("target key {} (cost {})", key, cost);
            key
        }
        None => Key::new(0, Mode::Major),
    }
}
