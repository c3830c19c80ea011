//! Speaker output via `cpal`.
//!
//! [`CpalPlayback`] owns the output stream on a dedicated `audio-playback`
//! thread.  [`PlaybackDevice::write`] converts PCM16 to `f32`, resamples to
//! the device rate when it cannot run at the session's receive rate, hands
//! the samples to the callback buffer and blocks until the callback has
//! consumed all but a low watermark of them.  A write therefore lasts about
//! as long as the audio it plays, while the next chunk is queued before the
//! callback runs dry.

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleRate, SizedSample};

use super::device::{select_device, DeviceError, PlaybackDevice};
use super::frame::pcm16_le_to_f32;
use super::resample::{resample, upmix_from_mono};
use crate::config::AudioConfig;

/// Slack added on top of the chunk duration before a write gives up waiting.
const DRAIN_SLACK: Duration = Duration::from_millis(500);

/// Audio left buffered when a write returns, covering the gap until the
/// next chunk arrives.
const LOW_WATERMARK: Duration = Duration::from_millis(100);

/// State shared between the writer and the cpal callback.
struct Shared {
    samples: Mutex<VecDeque<f32>>,
    drained: Condvar,
    failure: Mutex<Option<String>>,
}

impl Shared {
    fn samples(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

// ---------------------------------------------------------------------------
// CpalPlayback
// ---------------------------------------------------------------------------

/// Blocking speaker writer for mono PCM16 at `AudioConfig::receive_sample_rate`.
pub struct CpalPlayback {
    shared: Arc<Shared>,
    source_rate: u32,
    device_rate: u32,
    channels: u16,
    /// Interleaved samples that may remain buffered when `write` returns.
    low_watermark: usize,
    _stop: mpsc::Sender<()>,
}

impl CpalPlayback {
    /// Open the configured output device and start an idle stream.
    pub fn open(config: &AudioConfig) -> Result<Self, DeviceError> {
        let shared = Arc::new(Shared {
            samples: Mutex::new(VecDeque::new()),
            drained: Condvar::new(),
            failure: Mutex::new(None),
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(u32, u16), DeviceError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let device_name = config.output_device.clone();
        let preferred_rate = config.receive_sample_rate;
        let callback_shared = Arc::clone(&shared);

        std::thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                let started = start_stream(device_name.as_deref(), preferred_rate, callback_shared);
                let stream = match started {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("audio: playback stream closed");
            })
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let (device_rate, channels) = ready_rx.recv().map_err(|_| DeviceError::WorkerGone)??;

        Ok(Self {
            shared,
            source_rate: config.receive_sample_rate,
            device_rate,
            channels,
            low_watermark: watermark_samples(device_rate, channels),
            _stop: stop_tx,
        })
    }
}

impl PlaybackDevice for CpalPlayback {
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        if let Some(e) = self.shared.take_failure() {
            return Err(DeviceError::Stream(e));
        }

        let mono = resample(&pcm16_le_to_f32(pcm), self.source_rate, self.device_rate);
        if mono.is_empty() {
            return Ok(());
        }

        let frames = mono.len() as u64;
        let interleaved = upmix_from_mono(&mono, self.channels);
        let deadline = Instant::now()
            + Duration::from_millis(frames * 1000 / u64::from(self.device_rate.max(1)))
            + DRAIN_SLACK;

        let mut samples = self.shared.samples();
        samples.extend(interleaved);

        while samples.len() > self.low_watermark {
            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "audio: playback stalled, dropping {} buffered samples",
                    samples.len()
                );
                samples.clear();
                break;
            }
            let (guard, _) = self
                .shared
                .drained
                .wait_timeout(samples, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            samples = guard;
        }
        drop(samples);

        match self.shared.take_failure() {
            Some(e) => Err(DeviceError::Stream(e)),
            None => Ok(()),
        }
    }
}

fn watermark_samples(rate: u32, channels: u16) -> usize {
    let frames = u128::from(rate) * LOW_WATERMARK.as_millis() / 1000;
    frames as usize * usize::from(channels.max(1))
}

/// Output callback body: pop buffered samples into `data`, padding with
/// silence, and wake the writer.
fn fill_output<T>(shared: &Shared, data: &mut [T])
where
    T: SizedSample + FromSample<f32>,
{
    let mut samples = shared.samples();
    for out in data.iter_mut() {
        *out = T::from_sample_(samples.pop_front().unwrap_or(0.0));
    }
    shared.drained.notify_all();
}

// ---------------------------------------------------------------------------
// Stream construction
// ---------------------------------------------------------------------------

/// Find an output config that runs natively at `rate`: mono first, then
/// stereo, otherwise the device default (audio is resampled on write).
fn choose_config(device: &cpal::Device, rate: u32) -> Result<cpal::SupportedStreamConfig, DeviceError> {
    let native = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(rate)
                && c.max_sample_rate() >= SampleRate(rate)
        })
    };

    if let Some(range) = native(1).or_else(|| native(2)) {
        return Ok(range.with_sample_rate(SampleRate(rate)));
    }

    device
        .default_output_config()
        .map_err(|e| DeviceError::Config(e.to_string()))
}

fn start_stream(
    device_name: Option<&str>,
    preferred_rate: u32,
    shared: Arc<Shared>,
) -> Result<(cpal::Stream, u32, u16), DeviceError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name, false)?;

    let supported = choose_config(&device, preferred_rate)?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    log::info!(
        "audio: playing to {:?} at {} Hz, {} channel(s)",
        device.name().unwrap_or_default(),
        config.sample_rate.0,
        config.channels
    );

    let stream = match format {
        cpal::SampleFormat::F32 => build::<f32>(&device, &config, shared)?,
        cpal::SampleFormat::I16 => build::<i16>(&device, &config, shared)?,
        cpal::SampleFormat::U16 => build::<u16>(&device, &config, shared)?,
        other => {
            return Err(DeviceError::Config(format!(
                "unsupported output sample format {other:?}"
            )))
        }
    };

    stream.play()?;
    Ok((stream, config.sample_rate.0, config.channels))
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    let err_shared = Arc::clone(&shared);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| fill_output(&shared, data),
        move |err: cpal::StreamError| {
            log::error!("audio: playback stream error: {err}");
            *err_shared
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
            err_shared.drained.notify_all();
        },
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_playback(rate: u32, low_watermark: usize) -> (CpalPlayback, Arc<Shared>) {
        let shared = Arc::new(Shared {
            samples: Mutex::new(VecDeque::new()),
            drained: Condvar::new(),
            failure: Mutex::new(None),
        });
        let (stop, _) = mpsc::channel();
        let playback = CpalPlayback {
            shared: Arc::clone(&shared),
            source_rate: rate,
            device_rate: rate,
            channels: 1,
            low_watermark,
            _stop: stop,
        };
        (playback, shared)
    }

    #[test]
    fn write_blocks_until_callback_drains() {
        let (mut playback, shared) = fake_playback(24_000, 0);

        let consumer = std::thread::spawn(move || loop {
            let mut samples = shared.samples();
            if !samples.is_empty() {
                let n = samples.len();
                samples.clear();
                shared.drained.notify_all();
                return n;
            }
            drop(samples);
            std::thread::sleep(Duration::from_millis(1));
        });

        playback.write(&[0u8; 48]).expect("write");
        assert_eq!(consumer.join().unwrap(), 24);
    }

    #[test]
    fn write_reports_stream_failure() {
        let (mut playback, shared) = fake_playback(24_000, 0);
        *shared.failure.lock().unwrap() = Some("device lost".into());

        let err = playback.write(&[0u8; 4]).unwrap_err();
        assert!(err.to_string().contains("device lost"));
    }

    #[test]
    fn empty_write_is_noop() {
        let (mut playback, _shared) = fake_playback(24_000, 0);
        playback.write(&[]).expect("empty write");
    }

    #[test]
    fn watermark_scales_with_rate_and_channels() {
        assert_eq!(watermark_samples(24_000, 1), 2_400);
        assert_eq!(watermark_samples(48_000, 2), 9_600);
    }

    #[test]
    fn back_to_back_writes_play_without_a_gap() {
        const PERIOD: usize = 64;
        const CHUNK: usize = 100;

        let (mut playback, shared) = fake_playback(24_000, PERIOD);

        // Device callback with a fixed period, started once audio is queued.
        let consumer = std::thread::spawn(move || {
            while shared.samples().is_empty() {
                std::thread::sleep(Duration::from_millis(1));
            }
            let mut played = Vec::new();
            let mut block = [0.0_f32; PERIOD];
            for _ in 0..50 {
                fill_output(&shared, &mut block);
                played.extend_from_slice(&block);
                if played.iter().filter(|s| **s != 0.0).count() >= 2 * CHUNK {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            played
        });

        let chunk: Vec<u8> = std::iter::repeat(1000_i16.to_le_bytes())
            .take(CHUNK)
            .flatten()
            .collect();
        playback.write(&chunk).expect("first write");
        playback.write(&chunk).expect("second write");

        let played = consumer.join().unwrap();
        assert!(played.len() >= 2 * CHUNK);
        assert!(
            played[..2 * CHUNK].iter().all(|s| *s != 0.0),
            "silence between chunks: {:?}",
            &played[..2 * CHUNK]
        );
    }
}
