//! Stemweld CLI — render declarative stem mashups from analyzed tracks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;

use stemweld_core::align::key::choose_target_key;
use stemweld_core::align::shift::plan_shifts_with_limits;
use stemweld_core::audio::io::{load_stem, write_wav};
use stemweld_core::mix::process::{render_masterplan, RenderConfig, TrackInput};
use stemweld_core::types::{Key, Masterplan, StemRole, TrackAnalysis};

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "stemweld",
    about = "Beat-grid alignment and mashup rendering for separated stems",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a masterplan into a mixed WAV
    Render(RenderArgs),
    /// Plan key and pitch shifts without rendering audio
    Plan(PlanArgs),
}

// ─── Shared arguments ────────────────────────────────────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// Track analysis JSON ({"tracks": [...]})
    #[arg(long)]
    tracks: PathBuf,

    /// Max semitone shift applied to vocal stems
    #[arg(long, default_value_t = 3)]
    vocal_shift_limit: i32,

    /// Max semitone shift applied to non-vocal stems
    #[arg(long, default_value_t = 6)]
    music_shift_limit: i32,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Render ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Render a masterplan against separated stems")]
struct RenderArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Masterplan JSON describing the section timeline
    #[arg(long)]
    plan: PathBuf,

    /// Directory of separated stems (<dir>/<track_id>/<role>.wav)
    #[arg(long)]
    stems: PathBuf,

    /// Output WAV path
    #[arg(long, default_value = "./stemweld-mix.wav")]
    output: PathBuf,

    /// Output sample rate
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Output channel count
    #[arg(long, default_value_t = 2)]
    channels: usize,

    /// Crossfade window between sections, in 4/4 bars
    #[arg(long, default_value_t = 2)]
    transition_bars: u32,

    /// Normalize overall loudness before the final peak pass
    #[arg(long, default_value_t = false)]
    loudness: bool,
}

// ─── Plan ────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Print the key decision and per-track shifts as JSON")]
struct PlanArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Force a target key (e.g. "Am", "F#") instead of choosing one
    #[arg(long)]
    target_key: Option<String>,
}

// ─── Input files ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TracksFile {
    tracks: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    #[serde(alias = "songId", alias = "song_id")]
    track_id: String,
    #[serde(flatten)]
    analysis: TrackAnalysis,
}

fn read_tracks(path: &Path) -> Result<Vec<TrackEntry>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading tracks file {}", path.display()))?;
    let file: TracksFile =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    if file.tracks.is_empty() {
        bail!("tracks file {} lists no tracks", path.display());
    }
    Ok(file.tracks)
}

fn read_plan(path: &Path) -> Result<Masterplan> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading plan {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Load every stem present on disk for a track. Missing files are fine
/// here; the render stage errors only on stems the plan actually uses.
fn load_track_stems(
    stems_dir: &Path,
    track_id: &str,
    sample_rate: u32,
    num_channels: usize,
) -> Result<BTreeMap<StemRole, stemweld_core::audio::buffer::AudioBuf>> {
    let track_dir = stems_dir.join(track_id);
    let mut stems = BTreeMap::new();
    for role in StemRole::ALL {
        for ext in ["wav", "mp3", "m4a", "flac"] {
            let path = track_dir.join(format!("{}.{}", role.as_str(), ext));
            if path.exists() {
                log::info!("loading stem {}", path.display());
                let buf = load_stem(&path, sample_rate, num_channels)
                    .with_context(|| format!("loading {}", path.display()))?;
                stems.insert(role, buf);
                break;
            }
        }
    }
    Ok(stems)
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::Render(a) if a.shared.verbose => "debug",
        Command::Plan(a) if a.shared.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Render(args) => run_render(args),
        Command::Plan(args) => run_plan(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Render runner ───────────────────────────────────────────────

fn run_render(args: RenderArgs) -> Result<()> {
    if !args.stems.is_dir() {
        bail!("stems directory not found: {}", args.stems.display());
    }
    let entries = read_tracks(&args.shared.tracks)?;
    let plan = read_plan(&args.plan)?;

    let mut tracks: BTreeMap<String, TrackInput> = BTreeMap::new();
    for entry in entries {
        let stems = load_track_stems(&args.stems, &entry.track_id, args.sample_rate, args.channels)?;
        if stems.is_empty() {
            log::warn!("no stems found for track '{}'", entry.track_id);
        }
        tracks.insert(
            entry.track_id,
            TrackInput {
                analysis: entry.analysis,
                stems,
            },
        );
    }

    let config = RenderConfig {
        sample_rate: args.sample_rate,
        num_channels: args.channels,
        vocal_shift_limit: args.shared.vocal_shift_limit,
        music_shift_limit: args.shared.music_shift_limit,
        transition_bars: args.transition_bars,
        loudness_normalize: args.loudness,
    };
    let result = render_masterplan(&plan, &tracks, &config)?;

    write_wav(&args.output, &result.audio)
        .with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("wrote {}", args.output.display());

    let manifest = json!({
        "output": args.output,
        "target_key": result.target_key.to_string(),
        "target_camelot": result.target_key.camelot(),
        "target_bpm": result.target_bpm,
        "shifts": result.shift_plan,
        "sections": plan.sections.len(),
        "duration_sec": result.audio.duration_sec(),
        "peak": result.audio.peak(),
    });
    let manifest_path = args.output.with_extension("json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    log::info!("wrote {}", manifest_path.display());

    Ok(())
}

// ─── Plan runner ─────────────────────────────────────────────────

fn run_plan(args: PlanArgs) -> Result<()> {
    let entries = read_tracks(&args.shared.tracks)?;

    let per_track_keys: BTreeMap<String, Key> = entries
        .iter()
        .map(|e| (e.track_id.clone(), e.analysis.key))
        .collect();

    let target_key = match &args.target_key {
        Some(name) => Key::parse(name)
            .with_context(|| format!("unrecognized key name '{}'", name))?,
        None => {
            let keys: Vec<Key> = entries.iter().map(|e| e.analysis.key).collect();
            choose_target_key(&keys)
        }
    };
    let shift_plan = plan_shifts_with_limits(
        &per_track_keys,
        target_key,
        args.shared.vocal_shift_limit,
        args.shared.music_shift_limit,
    );

    let tracks_json: Vec<_> = entries
        .iter()
        .map(|e| {
            let grid = e.analysis.beat_grid();
            json!({
                "track_id": e.track_id,
                "key": e.analysis.key.to_string(),
                "camelot": e.analysis.key.camelot(),
                "bpm": e.analysis.bpm,
                "bpm_confidence": grid.bpm_confidence,
                "beats": grid.beats_sec.len(),
                "downbeats": grid.downbeats_sec.len(),
                "shift_semitones": shift_plan.shifts.get(&e.track_id).copied().unwrap_or(0),
            })
        })
        .collect();

    let out = json!({
        "target_key": target_key.to_string(),
        "target_camelot": target_key.camelot(),
        "vocal_shift_limit": shift_plan.vocal_limit,
        "music_shift_limit": shift_plan.music_limit,
        "tracks": tracks_json,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(())
}
