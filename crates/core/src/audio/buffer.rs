//! Planar multichannel sample buffer.
//!
//! Every pipeline stage consumes one buffer and produces a new one; buffers
//! are never shared between stages, so no locking is needed anywhere.

/// Fixed-length multichannel audio, planar f64, tagged with a sample rate.
///
/// Invariant: all channels have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuf {
    channels: Vec<Vec<f64>>,
    sample_rate: u32,
}

impl AudioBuf {
    /// Build from planar channel data. Channels are truncated to the
    /// shortest one so the equal-length invariant holds.
    pub fn from_planar(mut channels: Vec<Vec<f64>>, sample_rate: u32) -> Self {
        let min_len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for ch in channels.iter_mut() {
            ch.truncate(min_len);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// A mono buffer from a single channel of samples.
    pub fn from_mono(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// All-zero buffer of `len` frames.
    pub fn silence(num_channels: usize, len: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; len]; num_channels],
            sample_rate,
        }
    }

    /// Zero-frame buffer, the starting state of a master mix.
    pub fn empty(num_channels: usize, sample_rate: u32) -> Self {
        Self::silence(num_channels, 0, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames (samples per channel).
    pub fn len(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_sec(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, idx: usize) -> &[f64] {
        &self.channels[idx]
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.channels
    }

    pub fn into_planar(self) -> Vec<Vec<f64>> {
        self.channels
    }

    /// Copy of the frame range `[start, end)`, clamped to valid bounds.
    pub fn slice(&self, start: usize, end: usize) -> AudioBuf {
        let len = self.len();
        let start = start.min(len);
        let end = end.min(len).max(start);
        let channels = self
            .channels
            .iter()
            .map(|c| c[start..end].to_vec())
            .collect();
        AudioBuf {
            channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Truncate or zero-pad every channel to exactly `len` frames.
    pub fn fit_to_len(&mut self, len: usize) {
        for ch in self.channels.iter_mut() {
            ch.resize(len, 0.0);
        }
    }

    /// Multiply every sample by a linear gain factor.
    pub fn scale(&mut self, factor: f64) {
        for ch in self.channels.iter_mut() {
            for s in ch.iter_mut() {
                *s *= factor;
            }
        }
    }

    /// Additively mix `other` into this buffer at a linear gain, starting at
    /// frame 0. Frames beyond either buffer's length are left untouched, so
    /// the layer is implicitly truncated to this buffer's length.
    pub fn add_scaled(&mut self, other: &AudioBuf, gain: f64) {
        let frames = self.len().min(other.len());
        for (ch_idx, ch) in self.channels.iter_mut().enumerate() {
            // Mono sources feed every output channel
            let src = &other.channels[ch_idx % other.channels.len().max(1)];
            for i in 0..frames {
                ch[i] += src[i] * gain;
            }
        }
    }

    /// Append all frames of `other` to this buffer.
    pub fn extend(&mut self, other: &AudioBuf) {
        for (ch_idx, ch) in self.channels.iter_mut().enumerate() {
            let src = &other.channels[ch_idx % other.channels.len().max(1)];
            ch.extend_from_slice(src);
        }
    }

    /// Peak absolute sample value across all channels. 0.0 for silence.
    pub fn peak(&self) -> f64 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f64, |acc, s| acc.max(s.abs()))
    }

    /// RMS over all channels. 0.0 for an empty buffer.
    pub fn rms(&self) -> f64 {
        let total: usize = self.channels.iter().map(|c| c.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let sum_sq: f64 = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s * s)
            .sum();
        (sum_sq / total as f64).sqrt()
    }

    /// Duplicate or drop channels so the buffer has exactly `n` channels.
    /// Mono is duplicated to fill; extra channels are dropped.
    pub fn with_channel_count(mut self, n: usize) -> AudioBuf {
        if self.channels.len() == n || n == 0 {
            return self;
        }
        if self.channels.is_empty() {
            return AudioBuf::silence(n, 0, self.sample_rate);
        }
        while self.channels.len() < n {
            let fill = self.channels[0].clone();
            self.channels.push(fill);
        }
        self.channels.truncate(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence() {
        let buf = AudioBuf::silence(2, 100, 44100);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn test_from_planar_truncates_to_shortest() {
        let buf = AudioBuf::from_planar(vec![vec![1.0; 10], vec![1.0; 7]], 44100);
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn test_slice_clamps() {
        let buf = AudioBuf::from_mono((0..100).map(|i| i as f64).collect(), 44100);
        let s = buf.slice(90, 200);
        assert_eq!(s.len(), 10);
        assert_eq!(s.channel(0)[0], 90.0);

        let empty = buf.slice(200, 300);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_fit_to_len_pads_and_truncates() {
        let mut buf = AudioBuf::from_mono(vec![1.0; 10], 44100);
        buf.fit_to_len(15);
        assert_eq!(buf.len(), 15);
        assert_eq!(buf.channel(0)[12], 0.0);

        buf.fit_to_len(5);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.channel(0)[4], 1.0);
    }

    #[test]
    fn test_add_scaled_truncates_layer() {
        let mut section = AudioBuf::silence(1, 10, 44100);
        let layer = AudioBuf::from_mono(vec![1.0; 20], 44100);
        section.add_scaled(&layer, 0.5);
        assert_eq!(section.len(), 10);
        assert!((section.channel(0)[9] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_add_scaled_mono_into_stereo() {
        let mut section = AudioBuf::silence(2, 4, 44100);
        let layer = AudioBuf::from_mono(vec![0.25; 4], 44100);
        section.add_scaled(&layer, 1.0);
        assert_eq!(section.channel(0), &[0.25; 4]);
        assert_eq!(section.channel(1), &[0.25; 4]);
    }

    #[test]
    fn test_peak_and_rms() {
        let buf = AudioBuf::from_mono(vec![0.5, -0.8, 0.1], 44100);
        assert!((buf.peak() - 0.8).abs() < 1e-12);
        assert!(buf.rms() > 0.0);
        assert_eq!(AudioBuf::empty(1, 44100).rms(), 0.0);
    }

    #[test]
    fn test_with_channel_count_upmix() {
        let buf = AudioBuf::from_mono(vec![1.0; 8], 44100).with_channel_count(2);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.channel(0), buf.channel(1));
    }

    #[test]
    fn test_with_channel_count_downmix_drops() {
        let buf = AudioBuf::from_planar(vec![vec![1.0; 8], vec![2.0; 8]], 44100)
            .with_channel_count(1);
        assert_eq!(buf.num_channels(), 1);
        assert_eq!(buf.channel(0)[0], 1.0);
    }
}
