//! Audio effects: gain, time stretch, pitch shift, crossfade joins.
//!
//! Time stretch and pitch shift are backed by Signalsmith Stretch (phase
//! vocoder); this module only drives the primitive, it does not implement
//! vocoder internals.

use crate::audio::buffer::AudioBuf;

/// Convert decibels to a linear gain factor.
pub fn db_to_gain(db: f64) -> f64 {
    10.0f64.powf(db / 20.0)
}

/// Apply gain in dB in place. Near-zero adjustments are skipped.
pub fn adjust_gain_db(buf: &mut AudioBuf, db: f64) {
    if db.abs() < 0.01 {
        return;
    }
    buf.scale(db_to_gain(db));
}

/// Run Signalsmith Stretch over the whole buffer, producing exactly
/// `out_len` frames per channel.
fn run_stretch(buf: &AudioBuf, out_len: usize, semitones: Option<f32>) -> AudioBuf {
    let num_channels = buf.num_channels().max(1);
    let sr = buf.sample_rate();

    let mut stretch = ssstretch::Stretch::new();
    stretch.preset_default(num_channels as i32, sr as f32);
    if let Some(st) = semitones {
        stretch.set_transpose_semitones(st, None);
    }

    let input: Vec<Vec<f32>> = buf
        .channels()
        .iter()
        .map(|c| c.iter().map(|&s| s as f32).collect())
        .collect();
    let mut output = vec![vec![0.0f32; out_len]; num_channels];

    stretch.process_vec(&input, buf.len() as i32, &mut output, out_len as i32);

    let channels = output
        .into_iter()
        .map(|c| c.into_iter().map(|s| s as f64).collect())
        .collect();
    AudioBuf::from_planar(channels, sr)
}

/// Time-stretch to exactly `out_len` frames, preserving pitch.
///
/// The implied ratio is `buf.len() / out_len`; a ratio above 1 speeds the
/// audio up. The vocoder fills the requested length exactly, so no
/// pad/truncate correction is needed afterwards.
pub fn stretch_to_len(buf: &AudioBuf, out_len: usize) -> AudioBuf {
    if out_len == 0 || buf.is_empty() {
        return AudioBuf::silence(buf.num_channels(), out_len, buf.sample_rate());
    }
    if out_len == buf.len() {
        return buf.clone();
    }
    run_stretch(buf, out_len, None)
}

/// Time-stretch by a duration factor: > 1.0 is slower (longer output).
pub fn time_stretch(buf: &AudioBuf, factor: f64) -> AudioBuf {
    if (factor - 1.0).abs() < 0.01 || buf.is_empty() {
        return buf.clone();
    }
    let out_len = (buf.len() as f64 * factor).round() as usize;
    stretch_to_len(buf, out_len)
}

/// Pitch-shift by semitones, preserving duration.
pub fn pitch_shift(buf: &AudioBuf, semitones: f64) -> AudioBuf {
    if semitones.abs() < 0.01 || buf.is_empty() {
        return buf.clone();
    }
    run_stretch(buf, buf.len(), Some(semitones as f32))
}

/// Append `next` onto `out`, overlapping exactly `fade` frames with a linear
/// crossfade. The result is `out.len() + next.len() - fade` frames; `fade`
/// is clamped to both operands.
pub fn append_with_crossfade(out: &mut AudioBuf, next: &AudioBuf, fade: usize) {
    let fade = fade.min(out.len()).min(next.len());

    if fade == 0 {
        out.extend(next);
        return;
    }

    let tail_start = out.len() - fade;
    let next_mono = next.num_channels();
    for (ch_idx, ch) in out.channels_mut().iter_mut().enumerate() {
        let src = next.channel(ch_idx % next_mono);
        for i in 0..fade {
            let t = i as f64 / fade as f64;
            ch[tail_start + i] = ch[tail_start + i] * (1.0 - t) + src[i] * t;
        }
        ch.extend_from_slice(&src[fade..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, dur_sec: f64, sr: u32) -> AudioBuf {
        let n = (dur_sec * sr as f64) as usize;
        let samples = (0..n)
            .map(|i| (std::f64::consts::TAU * freq * i as f64 / sr as f64).sin() * 0.5)
            .collect();
        AudioBuf::from_mono(samples, sr)
    }

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_gain(6.0) - 1.995).abs() < 0.01);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_adjust_gain_db() {
        let mut buf = AudioBuf::from_mono(vec![0.5; 100], 44100);
        adjust_gain_db(&mut buf, -6.0);
        assert!((buf.channel(0)[0] - 0.25).abs() < 0.02);
    }

    #[test]
    fn test_adjust_gain_db_zero_is_noop() {
        let mut buf = AudioBuf::from_mono(vec![0.5; 10], 44100);
        adjust_gain_db(&mut buf, 0.0);
        assert_eq!(buf.channel(0)[0], 0.5);
    }

    #[test]
    fn test_stretch_to_len_exact_length() {
        let buf = sine(440.0, 0.5, 16000);
        for out_len in [4000usize, 8000, 12000] {
            let stretched = stretch_to_len(&buf, out_len);
            assert_eq!(stretched.len(), out_len);
        }
    }

    #[test]
    fn test_stretch_to_len_identity() {
        let buf = sine(440.0, 0.1, 16000);
        let out = stretch_to_len(&buf, buf.len());
        assert_eq!(out, buf);
    }

    #[test]
    fn test_stretch_to_len_zero() {
        let buf = sine(440.0, 0.1, 16000);
        assert!(stretch_to_len(&buf, 0).is_empty());
    }

    #[test]
    fn test_time_stretch_double() {
        let buf = sine(440.0, 0.5, 16000);
        let out = time_stretch(&buf, 2.0);
        assert_eq!(out.len(), buf.len() * 2);
    }

    #[test]
    fn test_pitch_shift_preserves_length_and_energy() {
        let buf = sine(440.0, 1.0, 16000);
        let out = pitch_shift(&buf, 2.0);
        assert_eq!(out.len(), buf.len());
        assert!(out.rms() > 0.1, "output too quiet: rms={}", out.rms());
    }

    #[test]
    fn test_pitch_shift_zero_is_noop() {
        let buf = sine(440.0, 0.1, 16000);
        assert_eq!(pitch_shift(&buf, 0.0), buf);
    }

    #[test]
    fn test_pitch_shift_stereo() {
        let mono = sine(440.0, 0.5, 16000);
        let stereo = mono.with_channel_count(2);
        let out = pitch_shift(&stereo, -3.0);
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.len(), stereo.len());
    }

    #[test]
    fn test_append_with_crossfade_length() {
        let mut a = AudioBuf::from_mono(vec![1.0; 100], 16000);
        let b = AudioBuf::from_mono(vec![0.0; 100], 16000);
        append_with_crossfade(&mut a, &b, 20);
        assert_eq!(a.len(), 180);
        // Midpoint of the fade blends toward 0.5
        assert!((a.channel(0)[90] - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_append_with_crossfade_zero_fade() {
        let mut a = AudioBuf::from_mono(vec![1.0; 50], 16000);
        let b = AudioBuf::from_mono(vec![2.0; 50], 16000);
        append_with_crossfade(&mut a, &b, 0);
        assert_eq!(a.len(), 100);
        assert_eq!(a.channel(0)[50], 2.0);
    }

    #[test]
    fn test_append_with_crossfade_clamps_fade() {
        let mut a = AudioBuf::from_mono(vec![1.0; 5], 16000);
        let b = AudioBuf::from_mono(vec![0.0; 100], 16000);
        append_with_crossfade(&mut a, &b, 50);
        // fade clamped to 5
        assert_eq!(a.len(), 100);
    }
}
