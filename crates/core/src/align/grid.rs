//! Piecewise time-alignment of one beat grid onto another.
//!
//! Each source inter-beat interval is independently stretched to the length
//! of the matching target interval, then the slices are joined with short
//! crossfades so the stretch boundaries don't click.

use crate::audio::buffer::AudioBuf;
use crate::audio::effects::{append_with_crossfade, stretch_to_len};
use crate::error::{RenderError, Result};

/// Slices shorter than this are too small to stretch meaningfully and are
/// replaced by silence of the target interval length.
pub const MIN_SLICE_SAMPLES: usize = 32;

/// Crossfade at each slice join.
pub const JOIN_CROSSFADE_MS: f64 = 12.0;

/// Synthesize a uniform reference grid: beat `i` lands at `i * 60/bpm`.
pub fn uniform_grid(bpm: f64, beat_count: usize) -> Vec<f64> {
    let spb = 60.0 / bpm;
    (0..beat_count).map(|i| i as f64 * spb).collect()
}

/// Stretch `audio` piecewise so its beat grid lands sample-for-sample on the
/// target grid.
///
/// Both grids need at least 2 entries (one interval); intervals beyond the
/// shorter grid are dropped. The output length is exactly the sum of the
/// target interval lengths in samples: every slice is produced at its exact
/// target length, and each join crossfade overlaps a tail extension that was
/// stretched specifically for it, so the fades never eat into the total.
pub fn align_to_grid(
    audio: &AudioBuf,
    source_beats: &[f64],
    target_beats: &[f64],
) -> Result<AudioBuf> {
    if source_beats.len() < 2 || target_beats.len() < 2 {
        return Err(RenderError::InsufficientBeats {
            got: source_beats.len().min(target_beats.len()),
        });
    }

    let sr = audio.sample_rate() as f64;
    let num_channels = audio.num_channels();
    let intervals = source_beats.len().min(target_beats.len()) - 1;
    let fade = (JOIN_CROSSFADE_MS / 1000.0 * sr).round() as usize;

    // Per-boundary rounding keeps the interval lengths summing exactly to
    // the span of the target grid.
    let bounds: Vec<usize> = target_beats[..=intervals]
        .iter()
        .map(|t| (t * sr).round() as usize)
        .collect();
    let target_lens: Vec<usize> = bounds.windows(2).map(|w| w[1] - w[0]).collect();

    // Fades clamp to both neighboring intervals so short intervals survive.
    let join_fades: Vec<usize> = (0..intervals.saturating_sub(1))
        .map(|i| fade.min(target_lens[i]).min(target_lens[i + 1]))
        .collect();

    let mut out = AudioBuf::empty(num_channels, audio.sample_rate());

    for i in 0..intervals {
        let s0 = (source_beats[i] * sr).round() as usize;
        let s1 = (source_beats[i + 1] * sr).round() as usize;
        let src_len = s1.saturating_sub(s0);
        let target_len = target_lens[i];

        // All slices except the last carry an extra stretched tail that the
        // next join's crossfade will consume.
        let tail = if i + 1 < intervals { join_fades[i] } else { 0 };

        let segment = if src_len < MIN_SLICE_SAMPLES || target_len == 0 {
            log::debug!(
                "degenerate slice {} ({} src samples): filling {} target samples with silence",
                i,
                src_len,
                target_len
            );
            AudioBuf::silence(num_channels, target_len + tail, audio.sample_rate())
        } else {
            let ratio = src_len as f64 / target_len as f64;
            let src_tail = (tail as f64 * ratio).round() as usize;
            let chunk = audio.slice(s0, s1 + src_tail);
            let mut segment = stretch_to_len(&chunk, target_len + tail);
            segment.fit_to_len(target_len + tail);
            segment
        };

        let join = if i == 0 { 0 } else { join_fades[i - 1] };
        append_with_crossfade(&mut out, &segment, join);
    }

    Ok(out)
}
