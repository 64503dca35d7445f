//! Full render pipeline: key/shift planning, per-stem alignment, section
//! mixing, transitions, and final normalization.
//!
//! Everything here is a pure transform over explicit inputs; file I/O and
//! collaborator calls (separation, analysis, planning, upload) live outside
//! the core.

use std::collections::{BTreeMap, BTreeSet};

use crate::align::grid::{align_to_grid, uniform_grid};
use crate::align::key::choose_target_key;
use crate::align::shift::{plan_shifts_with_limits, ShiftPlan, DEFAULT_MUSIC_SHIFT_LIMIT, DEFAULT_VOCAL_SHIFT_LIMIT};
use crate::audio::buffer::AudioBuf;
use crate::audio::effects::{adjust_gain_db, pitch_shift};
use crate::error::{RenderError, Result};
use crate::mix::section::{render_section, PreparedStems};
use crate::mix::transitions::{echo_out, filter_sweep, s_curve_xfade, sidechain_duck, SweepMode};
use crate::types::{Key, Masterplan, StemRole, TrackAnalysis, TransitionStyle};

/// Final peak target: just under full scale.
const PEAK_TARGET: f64 = 0.98;

/// RMS-proxy loudness target in dBFS, ReplayGain style.
const LOUDNESS_TARGET_DB: f64 = -14.0;

/// Fallback tempo when neither the plan nor any track supplies one.
const DEFAULT_BPM: f64 = 120.0;

const SWEEP_START_HZ: f64 = 180.0;
const SWEEP_END_HZ: f64 = 12_000.0;
const ECHO_DELAY_MS: f64 = 300.0;
const ECHO_FEEDBACK: f64 = 0.35;

/// Render job configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub num_channels: usize,
    pub vocal_shift_limit: i32,
    pub music_shift_limit: i32,
    /// Transition crossfade window in bars (4/4).
    pub transition_bars: u32,
    /// Apply RMS loudness normalization before the final peak pass.
    pub loudness_normalize: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            num_channels: 2,
            vocal_shift_limit: DEFAULT_VOCAL_SHIFT_LIMIT,
            music_shift_limit: DEFAULT_MUSIC_SHIFT_LIMIT,
            transition_bars: 2,
            loudness_normalize: false,
        }
    }
}

/// One input track: analysis plus its separated stems, already decoded at
/// the job sample rate.
#[derive(Debug, Clone)]
pub struct TrackInput {
    pub analysis: TrackAnalysis,
    pub stems: BTreeMap<StemRole, AudioBuf>,
}

/// A finished render plus the planning decisions that produced it.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub audio: AudioBuf,
    pub target_key: Key,
    pub target_bpm: f64,
    pub shift_plan: ShiftPlan,
}

/// Scale the whole buffer so the peak sits at the target, just under full
/// scale. Total silence passes through unchanged; that is a valid mix, not
/// an error.
pub fn finalize_mix(mut master: AudioBuf) -> AudioBuf {
    let peak = master.peak();
    if peak > 0.0 {
        master.scale(PEAK_TARGET / peak);
    }
    master
}

/// Move the RMS loudness to the target level. A crude stand-in for a real
/// EBU R128 measurement, good enough for consistent output level.
pub fn loudness_normalize(buf: &mut AudioBuf) {
    let rms = buf.rms();
    if rms <= 1e-9 {
        return;
    }
    let current_db = 20.0 * rms.log10();
    adjust_gain_db(buf, LOUDNESS_TARGET_DB - current_db);
}

/// Align and pitch-shift every stem the plan references.
///
/// Each (track, stem) pair is independent; buffers are owned per stem, so
/// this loop could be fanned out across workers without any locking.
pub fn prepare_stems(
    plan: &Masterplan,
    tracks: &BTreeMap<String, TrackInput>,
    shift_plan: &ShiftPlan,
    target_bpm: f64,
) -> Result<PreparedStems> {
    let mut referenced: BTreeSet<(String, StemRole)> = BTreeSet::new();
    for section in &plan.sections {
        for layer in &section.layers {
            referenced.insert((layer.track_id.clone(), layer.stem));
        }
    }

    let mut prepared = PreparedStems::new();
    for (track_id, role) in referenced {
        let track = tracks
            .get(&track_id)
            .ok_or_else(|| RenderError::MissingTrack {
                track_id: track_id.clone(),
            })?;
        let stem = track
            .stems
            .get(&role)
            .ok_or_else(|| RenderError::MissingStem {
                track_id: track_id.clone(),
                role,
            })?;

        let grid = track.analysis.beat_grid();
        let target_beats = uniform_grid(target_bpm, grid.beats_sec.len());
        let aligned = align_to_grid(stem, &grid.beats_sec, &target_beats)?;

        let shift = shift_plan.applied_shift(&track_id, role);
        log::debug!(
            "prepared {}:{} ({} frames, {:+} st)",
            track_id,
            role,
            aligned.len(),
            shift
        );
        let shifted = pitch_shift(&aligned, shift as f64);

        prepared.insert((track_id, role), shifted);
    }

    Ok(prepared)
}

/// Dress the incoming section according to its transition style. The plain
/// and unknown styles change nothing; the S-curve append happens either way.
fn apply_transition_effect(
    buf: &mut AudioBuf,
    style: TransitionStyle,
    bpm: f64,
    bars: u32,
) {
    let fade_sec = 60.0 / bpm * 4.0 * bars as f64;
    match style {
        TransitionStyle::CleanCross | TransitionStyle::Other => {}
        TransitionStyle::FilterSweep => {
            filter_sweep(buf, SWEEP_START_HZ, SWEEP_END_HZ, fade_sec, SweepMode::LowPass)
        }
        TransitionStyle::EchoOut => echo_out(buf, ECHO_DELAY_MS, ECHO_FEEDBACK),
        TransitionStyle::SidechainDuck => sidechain_duck(buf, bpm, bars),
    }
}

/// Render a masterplan against its input tracks into one finished buffer.
///
/// All-or-nothing: any error aborts the job before anything is produced.
/// Sections are mixed strictly in timeline order, each append consuming the
/// accumulated master; finalization runs exactly once at the end.
pub fn render_masterplan(
    plan: &Masterplan,
    tracks: &BTreeMap<String, TrackInput>,
    config: &RenderConfig,
) -> Result<RenderResult> {
    if plan.sections.is_empty() {
        return Err(RenderError::InvalidPlan("no sections".into()));
    }
    if let Some(bad) = plan.sections.iter().find(|s| s.duration_sec <= 0.0) {
        return Err(RenderError::InvalidPlan(format!(
            "non-positive section duration: {}",
            bad.duration_sec
        )));
    }

    let keys: Vec<Key> = tracks.values().map(|t| t.analysis.key).collect();
    let target_key = plan.global.target_key.unwrap_or_else(|| choose_target_key(&keys));
    let target_bpm = plan
        .global
        .target_bpm
        .or_else(|| tracks.values().next().map(|t| t.analysis.bpm))
        .unwrap_or(DEFAULT_BPM);

    log::info!(
        "render: {} sections, target {} ({}) at {:.1} BPM",
        plan.sections.len(),
        target_key,
        target_key.camelot(),
        target_bpm
    );

    let per_track_keys: BTreeMap<String, Key> = tracks
        .iter()
        .map(|(id, t)| (id.clone(), t.analysis.key))
        .collect();
    let shift_plan = plan_shifts_with_limits(
        &per_track_keys,
        target_key,
        config.vocal_shift_limit,
        config.music_shift_limit,
    );

    let prepared = prepare_stems(plan, tracks, &shift_plan, target_bpm)?;

    let mut master = AudioBuf::empty(config.num_channels, config.sample_rate);
    for (i, section) in plan.sections.iter().enumerate() {
        if let Some(desc) = &section.description {
            log::info!("section {}: {}", i + 1, desc);
        }
        let mut rendered =
            render_section(section, &prepared, config.sample_rate, config.num_channels)?;

        // The transition describes the join to the previous section; the
        // first section has nothing to join.
        if !master.is_empty() {
            apply_transition_effect(
                &mut rendered,
                section.transition,
                target_bpm,
                config.transition_bars,
            );
        }
        master = s_curve_xfade(master, rendered, config.transition_bars, target_bpm);
    }

    if config.loudness_normalize {
        loudness_normalize(&mut master);
    }
    let audio = finalize_mix(master);

    log::info!(
        "render complete: {:.1}s, peak {:.3}",
        audio.duration_sec(),
        audio.peak()
    );

    Ok(RenderResult {
        audio,
        target_key,
        target_bpm,
        shift_plan,
    })
}
