//! Section rendering: layered additive mixing of prepared stems.

use std::collections::BTreeMap;

use crate::audio::buffer::AudioBuf;
use crate::audio::effects::db_to_gain;
use crate::error::{RenderError, Result};
use crate::types::{Section, StemRole};

/// Stems that have already been aligned and pitch-shifted, keyed by
/// (track id, stem role).
pub type PreparedStems = BTreeMap<(String, StemRole), AudioBuf>;

/// Mix one section's layers into a silence buffer of the section duration.
///
/// Each layer contributes additively for the full section, truncated or
/// zero-padded to the section length. No clipping or limiting happens here;
/// headroom is settled once at final normalization.
pub fn render_section(
    section: &Section,
    prepared: &PreparedStems,
    sample_rate: u32,
    num_channels: usize,
) -> Result<AudioBuf> {
    let len = (section.duration_sec * sample_rate as f64).round() as usize;
    let mut out = AudioBuf::silence(num_channels, len, sample_rate);

    for layer in &section.layers {
        let stem = prepared
            .get(&(layer.track_id.clone(), layer.stem))
            .ok_or_else(|| RenderError::MissingStem {
                track_id: layer.track_id.clone(),
                role: layer.stem,
            })?;

        let gain = layer.gain_db.map(db_to_gain).unwrap_or(1.0);
        out.add_scaled(stem, gain);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Layer;

    fn section(duration_sec: f64, layers: Vec<Layer>) -> Section {
        Section {
            duration_sec,
            transition: Default::default(),
            layers,
            description: None,
        }
    }

    fn layer(track: &str, stem: StemRole, gain_db: Option<f64>) -> Layer {
        Layer {
            track_id: track.to_string(),
            stem,
            gain_db,
        }
    }

    fn prepared_with(track: &str, stem: StemRole, buf: AudioBuf) -> PreparedStems {
        let mut map = PreparedStems::new();
        map.insert((track.to_string(), stem), buf);
        map
    }

    #[test]
    fn test_empty_section_is_silence() {
        let out = render_section(&section(1.0, vec![]), &PreparedStems::new(), 44100, 2).unwrap();
        assert_eq!(out.len(), 44100);
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_missing_stem_errors() {
        let sec = section(1.0, vec![layer("t1", StemRole::Vocals, None)]);
        let err = render_section(&sec, &PreparedStems::new(), 44100, 1).unwrap_err();
        assert!(matches!(err, RenderError::MissingStem { .. }));
    }

    #[test]
    fn test_layer_truncated_to_section() {
        let stems = prepared_with(
            "t1",
            StemRole::Drums,
            AudioBuf::from_mono(vec![0.5; 2000], 1000),
        );
        let sec = section(1.0, vec![layer("t1", StemRole::Drums, None)]);
        let out = render_section(&sec, &stems, 1000, 1).unwrap();
        assert_eq!(out.len(), 1000);
        assert!((out.channel(0)[999] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_short_layer_padded_with_silence() {
        let stems = prepared_with(
            "t1",
            StemRole::Bass,
            AudioBuf::from_mono(vec![0.5; 200], 1000),
        );
        let sec = section(1.0, vec![layer("t1", StemRole::Bass, None)]);
        let out = render_section(&sec, &stems, 1000, 1).unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(out.channel(0)[500], 0.0);
    }

    #[test]
    fn test_gain_applied() {
        let stems = prepared_with(
            "t1",
            StemRole::Other,
            AudioBuf::from_mono(vec![1.0; 100], 1000),
        );
        let sec = section(0.1, vec![layer("t1", StemRole::Other, Some(-20.0))]);
        let out = render_section(&sec, &stems, 1000, 1).unwrap();
        assert!((out.channel(0)[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_layers_mix_additively_no_clipping() {
        let mut stems = PreparedStems::new();
        stems.insert(
            ("t1".to_string(), StemRole::Drums),
            AudioBuf::from_mono(vec![0.8; 100], 1000),
        );
        stems.insert(
            ("t2".to_string(), StemRole::Bass),
            AudioBuf::from_mono(vec![0.8; 100], 1000),
        );
        let sec = section(
            0.1,
            vec![
                layer("t1", StemRole::Drums, None),
                layer("t2", StemRole::Bass, None),
            ],
        );
        let out = render_section(&sec, &stems, 1000, 1).unwrap();
        // Sum exceeds full scale; that's fine until finalization
        assert!((out.channel(0)[0] - 1.6).abs() < 1e-12);
    }
}
