//! Audio I/O: WAV read/write, compressed decode, resampling.
//!
//! This is the only part of the core that touches files; the alignment and
//! mixing stages operate purely on in-memory buffers.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

use crate::audio::buffer::AudioBuf;

/// Read a WAV file into a planar multichannel buffer.
///
/// Int samples are normalized to f64 in [-1, 1]; float WAVs pass through.
pub fn read_wav(path: &Path) -> Result<AudioBuf> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let num_channels = spec.channels as usize;

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
    };

    Ok(deinterleave(&interleaved, num_channels, sample_rate))
}

/// Write a buffer to a 16-bit PCM WAV file, clipping to [-1, 1].
///
/// Creates parent directories if needed.
pub fn write_wav(path: &Path, buf: &AudioBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let spec = WavSpec {
        channels: buf.num_channels() as u16,
        sample_rate: buf.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for frame in 0..buf.len() {
        for ch in buf.channels() {
            let clipped = ch[frame].clamp(-1.0, 1.0);
            writer.write_sample((clipped * 32767.0) as i16)?;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

fn deinterleave(interleaved: &[f64], num_channels: usize, sample_rate: u32) -> AudioBuf {
    let num_channels = num_channels.max(1);
    let frames = interleaved.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(frames); num_channels];
    for frame in interleaved.chunks_exact(num_channels) {
        for (ch, &s) in channels.iter_mut().zip(frame) {
            ch.push(s);
        }
    }
    AudioBuf::from_planar(channels, sample_rate)
}

/// Resample a buffer to a new rate using rubato's sinc resampler.
pub fn resample(buf: &AudioBuf, to_sr: u32) -> Result<AudioBuf> {
    if buf.sample_rate() == to_sr || buf.is_empty() {
        return Ok(AudioBuf::from_planar(buf.channels().to_vec(), to_sr));
    }

    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_sr as f64 / buf.sample_rate() as f64;
    let mut resampler = SincFixedIn::<f64>::new(
        ratio,
        2.0,
        params,
        buf.len(),
        buf.num_channels(),
    )?;

    let input: Vec<Vec<f64>> = buf.channels().to_vec();
    let output = resampler.process(&input, None)?;

    Ok(AudioBuf::from_planar(output, to_sr))
}

/// Decode any supported audio file (WAV/MP3/AAC/MP4) to a planar buffer at
/// its native sample rate via symphonia.
pub fn decode_audio(path: &Path) -> Result<AudioBuf> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found")?;

    let track_id = track.id;
    let source_sr = track.codec_params.sample_rate.unwrap_or(44100);
    let num_channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported codec")?;

    let mut channels: Vec<Vec<f64>> = vec![Vec::new(); num_channels.max(1)];

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let num_frames = decoded.frames();
                let mut sample_buf = SampleBuffer::<f64>::new(num_frames as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                let interleaved = sample_buf.samples();

                for frame in 0..num_frames {
                    for (ch_idx, ch) in channels.iter_mut().enumerate() {
                        ch.push(interleaved[frame * num_channels + ch_idx]);
                    }
                }
            }
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if channels.iter().all(|c| c.is_empty()) {
        anyhow::bail!("No audio decoded from {}", path.display());
    }

    Ok(AudioBuf::from_planar(channels, source_sr))
}

/// Load a stem file and conform it to the job sample rate and channel count.
///
/// WAVs take the hound fast path; everything else goes through symphonia.
pub fn load_stem(path: &Path, sample_rate: u32, num_channels: usize) -> Result<AudioBuf> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    let decoded = if is_wav {
        read_wav(path)?
    } else {
        decode_audio(path)?
    };

    let conformed = resample(&decoded, sample_rate)?;
    Ok(conformed.with_channel_count(num_channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_wav_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stemweld_test_io_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn sine_buf(freq: f64, dur_sec: f64, sr: u32, channels: usize) -> AudioBuf {
        let n = (dur_sec * sr as f64) as usize;
        let samples: Vec<f64> = (0..n)
            .map(|i| (std::f64::consts::TAU * freq * i as f64 / sr as f64).sin() * 0.5)
            .collect();
        AudioBuf::from_mono(samples, sr).with_channel_count(channels)
    }

    #[test]
    fn test_write_read_roundtrip_stereo() {
        let path = temp_wav_path("roundtrip.wav");
        let buf = sine_buf(440.0, 0.25, 16000, 2);
        write_wav(&path, &buf).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.sample_rate(), 16000);
        assert_eq!(read.num_channels(), 2);
        assert_eq!(read.len(), buf.len());

        // 16-bit quantization introduces small error
        for (a, b) in buf.channel(0).iter().zip(read.channel(0)) {
            assert!((a - b).abs() < 0.001, "sample mismatch: {} vs {}", a, b);
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_clips_values() {
        let path = temp_wav_path("clipping.wav");
        let buf = AudioBuf::from_mono(vec![-2.0, -1.0, 0.0, 1.0, 2.0], 16000);
        write_wav(&path, &buf).unwrap();

        let read = read_wav(&path).unwrap();
        assert!(read.channel(0)[0] >= -1.0 && read.channel(0)[0] <= -0.99);
        assert!(read.channel(0)[4] >= 0.99 && read.channel(0)[4] <= 1.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resample_same_rate() {
        let buf = sine_buf(440.0, 0.1, 16000, 1);
        let out = resample(&buf, 16000).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_resample_upsample() {
        let buf = sine_buf(440.0, 0.5, 8000, 2);
        let out = resample(&buf, 16000).unwrap();
        assert_eq!(out.sample_rate(), 16000);
        assert_eq!(out.num_channels(), 2);
        // Sinc resampler trims at the edges; allow wide tolerance
        let expected = buf.len() * 2;
        assert!(
            out.len() >= expected * 7 / 8 && out.len() <= expected * 9 / 8,
            "Expected ~{} frames, got {}",
            expected,
            out.len()
        );
    }

    #[test]
    fn test_load_stem_conforms_rate_and_channels() {
        let path = temp_wav_path("stem.wav");
        let buf = sine_buf(440.0, 0.5, 22050, 1);
        write_wav(&path, &buf).unwrap();

        let stem = load_stem(&path, 44100, 2).unwrap();
        assert_eq!(stem.sample_rate(), 44100);
        assert_eq!(stem.num_channels(), 2);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_decode_audio_wav_via_symphonia() {
        let path = temp_wav_path("decode.wav");
        let buf = sine_buf(440.0, 0.5, 44100, 2);
        write_wav(&path, &buf).unwrap();

        let decoded = decode_audio(&path).unwrap();
        assert_eq!(decoded.sample_rate(), 44100);
        assert_eq!(decoded.num_channels(), 2);
        assert_eq!(decoded.len(), buf.len());

        std::fs::remove_file(&path).ok();
    }
}
