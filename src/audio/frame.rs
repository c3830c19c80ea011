//! Tagged media frames and 16-bit PCM conversion helpers.
//!
//! Every captured chunk travels to the session as an [`AudioFrame`]: raw
//! bytes plus the sample rate, channel count and a [`MediaType`] tag.  The
//! wire format on both directions is little-endian signed 16-bit PCM.

// ---------------------------------------------------------------------------
// MediaType
// ---------------------------------------------------------------------------

/// MIME tag attached to every outbound media frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Raw little-endian 16-bit PCM audio.
    AudioPcm,
    /// A single JPEG encoded still frame (camera or screen).
    ImageJpeg,
}

impl MediaType {
    /// The MIME string sent on the wire.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::AudioPcm => "audio/pcm",
            MediaType::ImageJpeg => "image/jpeg",
        }
    }
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// An immutable chunk of media owned by whichever queue currently holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    data: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    media_type: MediaType,
}

impl AudioFrame {
    /// Wrap little-endian PCM16 bytes captured at `sample_rate`.
    pub fn pcm(data: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        Self {
            data,
            sample_rate,
            channels,
            media_type: MediaType::AudioPcm,
        }
    }

    /// Wrap an encoded JPEG still.  Rate and channel count are meaningless
    /// for images and are reported as zero.
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            data,
            sample_rate: 0,
            channels: 0,
            media_type: MediaType::ImageJpeg,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// MIME string including the rate parameter for PCM audio, e.g.
    /// `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        match self.media_type {
            MediaType::AudioPcm => format!("{};rate={}", self.media_type.mime(), self.sample_rate),
            MediaType::ImageJpeg => self.media_type.mime().to_string(),
        }
    }

    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PCM16 helpers
// ---------------------------------------------------------------------------

/// Convert `f32` samples in `[-1.0, 1.0]` to little-endian PCM16 bytes.
///
/// Out-of-range samples are clamped rather than wrapped.
///
/// ```rust
/// use live_voice_agent::audio::f32_to_pcm16_le;
///
/// let bytes = f32_to_pcm16_le(&[0.0, 1.0]);
/// assert_eq!(bytes, vec![0x00, 0x00, 0xFF, 0x7F]);
/// ```
pub fn f32_to_pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Convert little-endian PCM16 bytes to `f32` samples in `[-1.0, 1.0]`.
///
/// A trailing odd byte is ignored.
pub fn pcm16_le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_frame_reports_rate_in_mime() {
        let frame = AudioFrame::pcm(vec![0, 0, 1, 0], 16_000, 1);
        assert_eq!(frame.mime_type(), "audio/pcm;rate=16000");
        assert_eq!(frame.media_type(), MediaType::AudioPcm);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn jpeg_frame_has_plain_mime() {
        let frame = AudioFrame::jpeg(vec![0xFF, 0xD8]);
        assert_eq!(frame.mime_type(), "image/jpeg");
        assert_eq!(frame.sample_rate(), 0);
    }

    #[test]
    fn audio_frame_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioFrame>();
    }

    #[test]
    fn pcm16_clamps_out_of_range() {
        let bytes = f32_to_pcm16_le(&[2.0, -2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -i16::MAX);
    }

    #[test]
    fn pcm16_decode_ignores_trailing_byte() {
        let samples = pcm16_le_to_f32(&[0x00, 0x40, 0x01]);
        assert_eq!(samples.len(), 1);
        assert!((samples[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn pcm16_preserves_sign_through_conversion() {
        let samples = pcm16_le_to_f32(&f32_to_pcm16_le(&[0.25, -0.25]));
        assert!((samples[0] - 0.25).abs() < 1e-3);
        assert!((samples[1] + 0.25).abs() < 1e-3);
    }
}
