//! Microphone capture via `cpal`.
//!
//! [`CpalCapture`] keeps the cpal input stream alive on a dedicated
//! `audio-capture` thread (the stream itself is not `Send` on every
//! platform).  The cpal callback downmixes each hardware buffer, feeds it
//! through a [`StreamResampler`] that carries its phase from one buffer to
//! the next, and forwards the result over a std channel;
//! [`CaptureDevice::read_chunk`] blocks until a full chunk has accumulated.
//!
//! ```text
//! cpal callback ──downmix──resample──▶ mpsc ──▶ read_chunk() ──▶ PCM16 bytes
//! ```
//!
//! Dropping the [`CpalCapture`] closes the stop channel, which lets the
//! owning thread drop the stream and exit.

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use super::device::{select_device, CaptureDevice, DeviceError};
use super::frame::f32_to_pcm16_le;
use super::resample::{downmix_to_mono, StreamResampler};
use crate::config::AudioConfig;

/// Messages sent from the cpal callbacks to the reader.
enum CaptureMsg {
    Samples(Vec<f32>),
    Failed(String),
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Blocking microphone reader producing mono PCM16 chunks at
/// `AudioConfig::send_sample_rate`.
pub struct CpalCapture {
    rx: mpsc::Receiver<CaptureMsg>,
    pending: Vec<f32>,
    chunk_frames: usize,
    /// Dropping this sender stops the stream thread.
    _stop: mpsc::Sender<()>,
}

impl CpalCapture {
    /// Open the configured input device and start streaming.
    ///
    /// Blocks until the stream thread reports that the stream is playing or
    /// that it failed to build.
    pub fn open(config: &AudioConfig) -> Result<Self, DeviceError> {
        let (msg_tx, msg_rx) = mpsc::channel::<CaptureMsg>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let device_name = config.input_device.clone();
        let target_rate = config.send_sample_rate;

        std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let stream = match start_stream(device_name.as_deref(), target_rate, msg_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Returns once the CpalCapture (and its sender) is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("audio: capture stream closed");
            })
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        ready_rx.recv().map_err(|_| DeviceError::WorkerGone)??;

        Ok(Self {
            rx: msg_rx,
            pending: Vec::with_capacity(config.chunk_frames * 2),
            chunk_frames: config.chunk_frames.max(1),
            _stop: stop_tx,
        })
    }
}

impl CaptureDevice for CpalCapture {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        while self.pending.len() < self.chunk_frames {
            match self.rx.recv() {
                Ok(CaptureMsg::Samples(samples)) => self.pending.extend(samples),
                Ok(CaptureMsg::Failed(e)) => return Err(DeviceError::Stream(e)),
                // Every callback sender is gone: the stream has ended.
                Err(_) => return Ok(None),
            }
        }

        let chunk: Vec<f32> = self.pending.drain(..self.chunk_frames).collect();
        Ok(Some(f32_to_pcm16_le(&chunk)))
    }
}

// ---------------------------------------------------------------------------
// Stream construction
// ---------------------------------------------------------------------------

fn start_stream(
    device_name: Option<&str>,
    target_rate: u32,
    tx: mpsc::Sender<CaptureMsg>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name, true)?;

    let supported = device
        .default_input_config()
        .map_err(|e| DeviceError::Config(e.to_string()))?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    log::info!(
        "audio: capturing from {:?} at {} Hz, {} channel(s)",
        device.name().unwrap_or_default(),
        config.sample_rate.0,
        config.channels
    );

    let stream = match format {
        cpal::SampleFormat::F32 => build::<f32>(&device, &config, target_rate, tx)?,
        cpal::SampleFormat::I16 => build::<i16>(&device, &config, target_rate, tx)?,
        cpal::SampleFormat::U16 => build::<u16>(&device, &config, target_rate, tx)?,
        other => {
            return Err(DeviceError::Config(format!(
                "unsupported input sample format {other:?}"
            )))
        }
    };

    stream.play()?;
    Ok(stream)
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    target_rate: u32,
    tx: mpsc::Sender<CaptureMsg>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let source_rate = config.sample_rate.0;
    let channels = config.channels;
    let err_tx = tx.clone();
    let mut resampler = StreamResampler::new(source_rate, target_rate);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let raw: Vec<f32> = data.iter().map(|&s| f32::from_sample_(s)).collect();
            let mono = downmix_to_mono(&raw, channels);
            // Ignore send errors; the reader may have been dropped.
            let _ = tx.send(CaptureMsg::Samples(resampler.process(&mono)));
        },
        move |err: cpal::StreamError| {
            log::error!("audio: capture stream error: {err}");
            let _ = err_tx.send(CaptureMsg::Failed(err.to_string()));
        },
        None,
    )?;

    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
