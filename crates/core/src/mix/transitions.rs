//! Section transitions: S-curve crossfade plus optional pre-append effects
//! (filter sweep, echo out, sidechain duck).

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64};

use crate::audio::buffer::AudioBuf;

/// Blend the tail of `master` with the head of `next` using a smooth tanh
/// S-curve over `bars` bars at `bpm` (4/4 assumed). Returns the combined
/// buffer; an empty master returns `next` unchanged.
pub fn s_curve_xfade(master: AudioBuf, next: AudioBuf, bars: u32, bpm: f64) -> AudioBuf {
    if master.is_empty() {
        return next;
    }

    let sr = master.sample_rate();
    let fade_sec = 60.0 / bpm * 4.0 * bars as f64;
    let fade = ((fade_sec * sr as f64) as usize)
        .min(master.len())
        .min(next.len());

    let mut out = master;
    if fade == 0 {
        out.extend(&next);
        return out;
    }

    let tail_start = out.len() - fade;
    let next_channels = next.num_channels();
    for (ch_idx, ch) in out.channels_mut().iter_mut().enumerate() {
        let src = next.channel(ch_idx % next_channels);
        for i in 0..fade {
            // t sweeps -1..1; tanh(3t) covers most of its range over that
            let t = if fade > 1 {
                -1.0 + 2.0 * i as f64 / (fade - 1) as f64
            } else {
                0.0
            };
            let w = 0.5 * (1.0 + (3.0 * t).tanh());
            ch[tail_start + i] = ch[tail_start + i] * (1.0 - w) + src[i] * w;
        }
        ch.extend_from_slice(&src[fade..]);
    }
    out
}

/// Sweep direction for [`filter_sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    LowPass,
    HighPass,
}

/// Sweep a filter cutoff exponentially from `start_hz` to `end_hz` over the
/// first `duration_sec` of the buffer, in place.
///
/// The cutoff is held per block (1/16 s) with the filter state carried
/// across blocks, so the sweep is stepped but click-free.
pub fn filter_sweep(
    buf: &mut AudioBuf,
    start_hz: f64,
    end_hz: f64,
    duration_sec: f64,
    mode: SweepMode,
) {
    let sr = buf.sample_rate();
    let n = ((duration_sec * sr as f64) as usize).min(buf.len());
    if n == 0 || start_hz <= 0.0 || end_hz <= 0.0 {
        return;
    }

    let block = (sr as usize / 16).max(1);
    let max_hz = sr as f64 / 2.0 * 0.99;
    let filter_type = match mode {
        SweepMode::LowPass => Type::LowPass,
        SweepMode::HighPass => Type::HighPass,
    };

    let coeffs_at = |cutoff: f64| {
        Coefficients::<f64>::from_params(
            filter_type,
            sr.hz(),
            cutoff.clamp(10.0, max_hz).hz(),
            Q_BUTTERWORTH_F64,
        )
    };

    let initial = match coeffs_at(start_hz) {
        Ok(c) => c,
        // Leave the audio unfiltered on a bad design; clamping above makes
        // this unreachable for sane sample rates
        Err(_) => return,
    };

    for ch in buf.channels_mut() {
        let mut filter = DirectForm2Transposed::<f64>::new(initial);
        let mut i = 0;
        while i < n {
            let t = i as f64 / (n - 1).max(1) as f64;
            let cutoff = start_hz * (end_hz / start_hz).powf(t);
            if let Ok(coeffs) = coeffs_at(cutoff) {
                filter.update_coefficients(coeffs);
            }
            let end = (i + block).min(n);
            for s in ch[i..end].iter_mut() {
                *s = filter.run(*s);
            }
            i = end;
        }
    }
}

/// Add a decaying feedback echo in place: `out[i] += feedback * out[i - d]`.
/// The tail decays within the buffer; the length does not change.
pub fn echo_out(buf: &mut AudioBuf, delay_ms: f64, feedback: f64) {
    let delay = (buf.sample_rate() as f64 * delay_ms / 1000.0) as usize;
    if delay == 0 || delay >= buf.len() {
        return;
    }
    for ch in buf.channels_mut() {
        for i in delay..ch.len() {
            ch[i] += feedback * ch[i - delay];
        }
    }
}

/// Four-on-the-floor pump envelope over the first `bars` bars, in place:
/// each beat dips to 30% and recovers linearly, the classic sidechain duck.
pub fn sidechain_duck(buf: &mut AudioBuf, bpm: f64, bars: u32) {
    let sr = buf.sample_rate();
    let beat_len = (sr as f64 * 60.0 / bpm) as usize;
    if beat_len == 0 {
        return;
    }
    let beats = 4 * bars as usize;

    for ch in buf.channels_mut() {
        let mut idx = 0;
        for _ in 0..beats {
            let end = (idx + beat_len).min(ch.len());
            if idx >= end {
                break;
            }
            let span = end - idx;
            for (i, s) in ch[idx..end].iter_mut().enumerate() {
                let t = i as f64 / span as f64;
                *s *= (0.3 + 0.7 * t).clamp(0.3, 1.0);
            }
            idx = end;
        }
    }
}
