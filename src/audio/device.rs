//! Blocking device seams used by the capture and playback tasks.
//!
//! Both traits are synchronous: every call may block the calling thread
//! for the length of one audio chunk, so the session tasks only ever invoke
//! them from `tokio::task::spawn_blocking`.  Opening a device is also a
//! blocking operation and goes through [`AudioDevices`].

use cpal::traits::{DeviceTrait, HostTrait};
use thiserror::Error;

use super::capture::CpalCapture;
use super::playback::CpalPlayback;
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors raised while opening or driving an audio device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No matching input/output device on the default host.
    #[error("no {0} device found")]
    NoDevice(&'static str),

    /// The device exists but offers no usable stream configuration.
    #[error("unsupported device configuration: {0}")]
    Config(String),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The stream reported a runtime error (device unplugged, driver reset …).
    #[error("audio stream failed: {0}")]
    Stream(String),

    /// The thread that owns the stream is gone.
    #[error("audio worker thread stopped unexpectedly")]
    WorkerGone,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A microphone delivering fixed-size chunks of mono PCM16 audio at the
/// session's send rate.
pub trait CaptureDevice: Send {
    /// Block until the next chunk is available.
    ///
    /// Returns `Ok(None)` once the device reports end-of-stream.
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, DeviceError>;
}

/// A speaker accepting mono PCM16 audio at the session's receive rate.
pub trait PlaybackDevice: Send {
    /// Play `pcm` and block until the device has consumed it.
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError>;
}

/// Factory for the session's devices.  Implementations may block.
pub trait AudioDevices: Send + Sync {
    fn open_capture(&self) -> Result<Box<dyn CaptureDevice>, DeviceError>;
    fn open_playback(&self) -> Result<Box<dyn PlaybackDevice>, DeviceError>;
}

// ---------------------------------------------------------------------------
// CpalDevices
// ---------------------------------------------------------------------------

/// Opens the cpal-backed microphone and speaker described by [`AudioConfig`].
#[derive(Debug, Clone)]
pub struct CpalDevices {
    config: AudioConfig,
}

impl CpalDevices {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl AudioDevices for CpalDevices {
    fn open_capture(&self) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        Ok(Box::new(CpalCapture::open(&self.config)?))
    }

    fn open_playback(&self) -> Result<Box<dyn PlaybackDevice>, DeviceError> {
        Ok(Box::new(CpalPlayback::open(&self.config)?))
    }
}

/// Pick the device named `wanted` (or the host default when `None`).
pub(crate) fn select_device(
    host: &cpal::Host,
    wanted: Option<&str>,
    input: bool,
) -> Result<cpal::Device, DeviceError> {
    let kind = if input { "input" } else { "output" };

    let Some(name) = wanted else {
        let default = if input {
            host.default_input_device()
        } else {
            host.default_output_device()
        };
        return default.ok_or(DeviceError::NoDevice(kind));
    };

    let matches = |device: &cpal::Device| device.name().is_ok_and(|n| n == name);
    let found = if input {
        host.input_devices()
            .map_err(|e| DeviceError::Config(e.to_string()))?
            .find(matches)
    } else {
        host.output_devices()
            .map_err(|e| DeviceError::Config(e.to_string()))?
            .find(matches)
    };

    if let Some(device) = found {
        return Ok(device);
    }

    log::warn!("audio: {kind} device {name:?} not found");
    Err(DeviceError::NoDevice(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_traits_are_object_safe() {
        struct Silence;
        impl CaptureDevice for Silence {
            fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
                Ok(None)
            }
        }
        let mut device: Box<dyn CaptureDevice> = Box::new(Silence);
        assert!(device.read_chunk().expect("read").is_none());
    }

    #[test]
    fn errors_name_the_device_kind() {
        assert_eq!(DeviceError::NoDevice("input").to_string(), "no input device found");
    }
}
