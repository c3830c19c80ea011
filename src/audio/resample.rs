//! Sample-rate conversion and channel downmixing.
//!
//! Devices rarely run at the session's fixed rates (16 kHz up, 24 kHz
//! down), so both directions pass through these helpers:
//!
//! 1. [`downmix_to_mono`]: average interleaved channels into one.
//! 2. [`resample`]: linear interpolation between any two rates.
//! 3. [`upmix_from_mono`]: duplicate a mono signal across output channels.
//!
//! [`StreamResampler`] is the stateful form of [`resample`] for audio that
//! arrives in many small buffers, such as capture callbacks.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; a partial trailing frame
/// is dropped.  `channels == 0` yields an empty vector.
///
/// ```rust
/// use live_voice_agent::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Repeat every mono sample `channels` times to build interleaved output.
pub fn upmix_from_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let n = channels.max(1) as usize;
    if n == 1 {
        return samples.to_vec();
    }
    samples
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(n))
        .collect()
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` to `to_rate` Hz using linear
/// interpolation.
///
/// Equal rates return a copy of the input.  The output length is
/// `ceil(samples.len() * to_rate / from_rate)`.
///
/// ```rust
/// use live_voice_agent::audio::resample;
///
/// let hi = vec![0.5_f32; 480]; // 10 ms @ 48 kHz
/// assert_eq!(resample(&hi, 48_000, 16_000).len(), 160);
/// assert_eq!(resample(&hi, 48_000, 24_000).len(), 240);
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            match samples.get(idx + 1) {
                Some(&next) => samples[idx] * (1.0 - frac) + next * frac,
                None => samples[idx],
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Linear resampler that carries its read position and the last input
/// sample across calls, so a stream split into buffers is interpolated as
/// one signal and the output length does not drift.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    step: f64,
    passthrough: bool,
    /// Read position relative to `prev` (index 0 of the working buffer).
    pos: f64,
    prev: Option<f32>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let passthrough = from_rate == to_rate || from_rate == 0 || to_rate == 0;
        Self {
            step: if passthrough { 1.0 } else { from_rate as f64 / to_rate as f64 },
            passthrough,
            pos: 0.0,
            prev: None,
        }
    }

    /// Resample the next buffer of the stream.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.passthrough {
            return input.to_vec();
        }

        let mut buf = Vec::with_capacity(input.len() + 1);
        buf.extend(self.prev);
        buf.extend_from_slice(input);
        let Some(&last) = buf.last() else {
            return Vec::new();
        };

        let end = (buf.len() - 1) as f64;
        let mut out = Vec::with_capacity((input.len() as f64 / self.step) as usize + 1);
        while self.pos < end {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            out.push(buf[idx] * (1.0 - frac) + buf[idx + 1] * frac);
            self.pos += self.step;
        }

        // The last sample becomes index 0 of the next working buffer.
        self.pos -= end;
        self.prev = Some(last);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_passthrough() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_drops_partial_frame() {
        let out = downmix_to_mono(&[1.0_f32, 1.0, 0.5], 2);
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn upmix_duplicates_each_sample() {
        assert_eq!(upmix_from_mono(&[0.1, 0.2], 2), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(upmix_from_mono(&[0.1], 0), vec![0.1]);
    }

    #[test]
    fn resample_same_rate_is_copy() {
        let input: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        assert_eq!(resample(&input, 24_000, 24_000), input);
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn resample_44100_to_16k_length() {
        let out = resample(&vec![0.0_f32; 44_100], 44_100, 16_000);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn resample_24k_to_48k_doubles_length() {
        let out = resample(&vec![0.0_f32; 240], 24_000, 48_000);
        assert_eq!(out.len(), 480);
    }

    #[test]
    fn resample_keeps_dc_level() {
        for &s in &resample(&vec![0.5_f32; 441], 44_100, 16_000) {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn resample_interpolates_between_samples() {
        // Upsampling 0.0 → 1.0 by 2x puts a midpoint between them.
        let out = resample(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stream_resampler_does_not_drift_over_small_buffers() {
        let mut r = StreamResampler::new(44_100, 16_000);
        let produced: usize = (0..100).map(|_| r.process(&[0.25; 441]).len()).sum();
        assert!(produced.abs_diff(16_000) <= 1, "got {produced}");
    }

    #[test]
    fn stream_resampler_matches_one_shot_across_buffer_edges() {
        let ramp: Vec<f32> = (0..1_000).map(|i| i as f32).collect();

        let mut whole = StreamResampler::new(48_000, 16_000);
        let expected = whole.process(&ramp);

        let mut split = StreamResampler::new(48_000, 16_000);
        let pieces: Vec<f32> = ramp.chunks(7).flat_map(|c| split.process(c)).collect();

        assert_eq!(pieces.len(), expected.len());
        for (a, b) in pieces.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
        // A ramp stays a ramp: every step is one third of an input sample apart.
        for pair in pieces.windows(2) {
            assert!((pair[1] - pair[0] - 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn stream_resampler_same_rate_is_copy() {
        let mut r = StreamResampler::new(16_000, 16_000);
        assert_eq!(r.process(&[0.1, 0.2]), vec![0.1, 0.2]);
    }
}
