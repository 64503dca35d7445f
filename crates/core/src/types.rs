use std::fmt;

use serde::{Deserialize, Serialize};

/// Pitch-class names in sharp spelling, index = semitones above C.
pub const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Major or minor mode. Mode differences never affect semitone distance;
/// they only add a cost penalty during target-key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

/// A musical key: pitch class 0-11 plus mode.
///
/// Serializes as its name string ("C", "F#", "Am", "C#m").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    pitch_class: u8,
    mode: Mode,
}

impl Key {
    /// Construct a key; the pitch class is taken modulo 12.
    pub fn new(pitch_class: i32, mode: Mode) -> Self {
        Self {
            pitch_class: pitch_class.rem_euclid(12) as u8,
            mode,
        }
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch_class
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Parse a key name like "C", "F#", "Am", "Bbm".
    ///
    /// Sharp and flat spellings are both accepted; a trailing "m" marks minor.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let (base, mode) = match name.strip_suffix('m') {
            // "Fm" is F minor, but a bare "m" is nothing
            Some(base) if !base.is_empty() => (base, Mode::Minor),
            _ => (name, Mode::Major),
        };

        let pitch_class = match base {
            "C" => 0,
            "C#" | "Db" => 1,
            "D" => 2,
            "D#" | "Eb" => 3,
            "E" => 4,
            "F" => 5,
            "F#" | "Gb" => 6,
            "G" => 7,
            "G#" | "Ab" => 8,
            "A" => 9,
            "A#" | "Bb" => 10,
            "B" => 11,
            _ => return None,
        };

        Some(Self { pitch_class, mode })
    }

    /// Camelot wheel code ("8B" for C major, "8A" for A minor).
    ///
    /// Adjacent numbers are a fifth apart; A/B of the same number are
    /// relative keys, which is why DJs use this as a compatibility chart.
    pub fn camelot(&self) -> String {
        let (offset, letter) = match self.mode {
            Mode::Major => (self.pitch_class as i32, 'B'),
            Mode::Minor => (self.pitch_class as i32 - 9, 'A'),
        };
        // 7 semitones per wheel step; multiplying by 7 inverts that step
        // mod 12 (7*7 = 49 ≡ 1), mapping pitch class to wheel position.
        let number = (offset * 7).rem_euclid(12) + 8;
        let number = if number > 12 { number - 12 } else { number };
        format!("{}{}", number, letter)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.mode {
            Mode::Major => "",
            Mode::Minor => "m",
        };
        write!(f, "{}{}", PITCH_NAMES[self.pitch_class as usize], suffix)
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Key::parse(&s).ok_or_else(|| format!("unrecognized key name: {:?}", s))
    }
}

impl From<Key> for String {
    fn from(k: Key) -> Self {
        k.to_string()
    }
}

/// One separated stem of a mixed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemRole {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl StemRole {
    pub const ALL: [StemRole; 4] = [
        StemRole::Vocals,
        StemRole::Drums,
        StemRole::Bass,
        StemRole::Other,
    ];

    /// Vocal stems get the tighter pitch-shift clamp (formant artifacts
    /// become audible at smaller shifts than on instrumental beds).
    pub fn is_vocal(&self) -> bool {
        matches!(self, StemRole::Vocals)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StemRole::Vocals => "vocals",
            StemRole::Drums => "drums",
            StemRole::Bass => "bass",
            StemRole::Other => "other",
        }
    }
}

impl fmt::Display for StemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected beat onsets for one track, with derived downbeats and a tempo
/// confidence score. Produced once by upstream analysis, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatGrid {
    pub bpm: f64,
    /// In [0, 1]: how regular the inter-beat intervals are.
    pub bpm_confidence: f64,
    /// Strictly increasing beat onset timestamps in seconds.
    pub beats_sec: Vec<f64>,
    /// Every 4th beat, assuming 4/4.
    pub downbeats_sec: Vec<f64>,
}

impl BeatGrid {
    /// Build a grid from raw beat timestamps, deriving downbeats and a
    /// confidence score from the spread of inter-beat intervals.
    pub fn from_beats(bpm: f64, beats_sec: Vec<f64>) -> Self {
        let downbeats_sec = beats_sec.iter().copied().step_by(4).collect();
        let bpm_confidence = interval_regularity(&beats_sec);
        Self {
            bpm,
            bpm_confidence,
            beats_sec,
            downbeats_sec,
        }
    }
}

/// Confidence proxy: 1 - stddev/mean of the inter-beat intervals, clamped.
fn interval_regularity(beats: &[f64]) -> f64 {
    if beats.len() < 2 {
        return 0.0;
    }
    let ibis: Vec<f64> = beats.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = ibis.iter().sum::<f64>() / ibis.len() as f64;
    let var = ibis.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / ibis.len() as f64;
    (1.0 - var.sqrt() / (mean + 1e-6)).clamp(0.0, 1.0)
}

/// Per-track musical analysis, as delivered by the upstream spectral
/// analysis collaborator. Read-only precondition for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub key: Key,
    pub bpm: f64,
    #[serde(default, alias = "beatTimestampsSec")]
    pub beats_sec: Vec<f64>,
    #[serde(default)]
    pub bpm_confidence: Option<f64>,
}

impl TrackAnalysis {
    pub fn beat_grid(&self) -> BeatGrid {
        let mut grid = BeatGrid::from_beats(self.bpm, self.beats_sec.clone());
        if let Some(conf) = self.bpm_confidence {
            grid.bpm_confidence = conf.clamp(0.0, 1.0);
        }
        grid
    }
}

/// How a section joins the previous one.
///
/// Every style rides the same 2-bar tanh S-curve; the non-plain styles
/// additionally post-process the incoming section before the blend.
/// Unrecognized style names fall back to `CleanCross`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    #[default]
    CleanCross,
    FilterSweep,
    EchoOut,
    SidechainDuck,
    #[serde(other)]
    Other,
}

/// One stem placed in a section, contributing for the full section duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    #[serde(alias = "songId", alias = "song_id")]
    pub track_id: String,
    pub stem: StemRole,
    #[serde(default, alias = "volume_db")]
    pub gain_db: Option<f64>,
}

/// One timeline entry of the masterplan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub duration_sec: f64,
    #[serde(default)]
    pub transition: TransitionStyle,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Global plan settings produced by the creative-planning collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default, alias = "targetBPM")]
    pub target_bpm: Option<f64>,
    #[serde(default, alias = "targetKey")]
    pub target_key: Option<Key>,
}

/// Declarative mix timeline. Unknown JSON fields are ignored; only the
/// fields the render pipeline consumes are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Masterplan {
    #[serde(alias = "timeline")]
    pub sections: Vec<Section>,
    #[serde(default, alias = "global_settings")]
    pub global: GlobalSettings,
}
