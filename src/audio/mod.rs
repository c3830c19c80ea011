//! Audio I/O: microphone capture, speaker playback and the shared buffers
//! between them and the session.
//!
//! # Data flow
//!
//! ```text
//! Microphone → cpal callback → downmix → resample 16 kHz → CpalCapture::read_chunk
//!            → AudioFrame (audio/pcm) → outbound queue (bounded)
//!
//! session audio → PlaybackQueue (unbounded, cleared on turn end)
//!            → CpalPlayback::write → resample to device rate → speaker
//! ```
//!
//! The playback task holds the single [`SpeakingWriter`]; the capture task
//! reads the matching [`SpeakingReader`] to suppress its own microphone
//! while the assistant talks.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use live_voice_agent::audio::{AudioDevices, CpalDevices};
//! use live_voice_agent::config::AudioConfig;
//!
//! let devices = CpalDevices::new(AudioConfig::default());
//! let mut mic = devices.open_capture().unwrap();
//! while let Some(chunk) = mic.read_chunk().unwrap() {
//!     println!("captured {} bytes", chunk.len());
//! }
//! ```

pub mod capture;
pub mod device;
pub mod frame;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod speaking;

pub use capture::CpalCapture;
pub use device::{AudioDevices, CaptureDevice, CpalDevices, DeviceError, PlaybackDevice};
pub use frame::{f32_to_pcm16_le, pcm16_le_to_f32, AudioFrame, MediaType};
pub use playback::CpalPlayback;
pub use queue::PlaybackQueue;
pub use resample::{downmix_to_mono, resample, upmix_from_mono, StreamResampler};
pub use speaking::{speaking_flag, SpeakingGuard, SpeakingReader, SpeakingWriter};
