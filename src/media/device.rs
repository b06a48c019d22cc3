//! CPAL-backed microphone capture and speaker playback.
//!
//! CPAL streams are not `Send`, so each device lives on its own thread.
//! Capture frames cross into async land over a bounded channel; playback
//! samples go the other way through a capped ring buffer the output
//! callback drains.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use super::{AudioSink, AudioSource, BoxFuture, SAMPLE_RATE, resample_linear};
use crate::{Error, Result};

const CAPTURE_QUEUE_FRAMES: usize = 32;
const WORKER_POLL: Duration = Duration::from_millis(50);
/// Upper bound on buffered playback, in seconds of audio.
const PLAYBACK_CAP_SECS: usize = 2;

/// Microphone capture producing 8 kHz mono PCM frames.
pub struct MicSource {
    frames: mpsc::Receiver<Vec<i16>>,
    stop: Arc<AtomicBool>,
}

impl MicSource {
    /// Open the default input device and start capturing.
    ///
    /// # Errors
    /// Returns `Error::MediaAccess` if no input device is present or the
    /// stream cannot be opened.
    pub fn open() -> Result<Self> {
        let (frame_tx, frames) = mpsc::channel(CAPTURE_QUEUE_FRAMES);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_worker = Arc::clone(&stop);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name("voicebot-mic".to_string())
            .spawn(move || capture_worker(&frame_tx, &stop_worker, &ready_tx))
            .map_err(|e| Error::MediaAccess(format!("failed to spawn capture thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| Error::MediaAccess("capture thread exited during startup".to_string()))?
            .map(|()| Self { frames, stop })
    }
}

impl AudioSource for MicSource {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Vec<i16>>> {
        Box::pin(async move { self.frames.recv().await })
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn capture_worker(
    frame_tx: &mpsc::Sender<Vec<i16>>,
    stop: &AtomicBool,
    ready_tx: &std::sync::mpsc::Sender<Result<()>>,
) {
    match build_capture_stream(frame_tx.clone()) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            while !stop.load(Ordering::Relaxed) && !frame_tx.is_closed() {
                std::thread::sleep(WORKER_POLL);
            }
            drop(stream);
        }
        Err(err) => {
            let _ = ready_tx.send(Err(err));
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn build_capture_stream(frame_tx: mpsc::Sender<Vec<i16>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::MediaAccess("no input device available".to_string()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| Error::MediaAccess(format!("input config unavailable: {e}")))?;

    let sample_format = supported.sample_format();
    let config = supported.config();
    let channels = usize::from(config.channels);
    let device_rate = config.sample_rate.0;
    let mut chunker = FrameChunker::new(device_rate, channels, frame_tx);
    let err_fn = |err: cpal::StreamError| tracing::error!("input stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| chunker.push(data),
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let pcm: Vec<i16> = data
                    .iter()
                    .map(|&x| (x.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
                    .collect();
                chunker.push(&pcm);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(Error::MediaAccess(format!(
                "unsupported input sample format {other:?}"
            )));
        }
    }
    .map_err(|e| Error::MediaAccess(format!("failed to open input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| Error::MediaAccess(format!("failed to start input stream: {e}")))?;
    Ok(stream)
}

/// Downmixes interleaved device audio to mono, cuts it into 20 ms chunks and
/// resamples each chunk to the track rate.
struct FrameChunker {
    device_rate: u32,
    channels: usize,
    chunk_samples: usize,
    buf: Vec<i16>,
    tx: mpsc::Sender<Vec<i16>>,
}

impl FrameChunker {
    fn new(device_rate: u32, channels: usize, tx: mpsc::Sender<Vec<i16>>) -> Self {
        Self {
            device_rate,
            channels: channels.max(1),
            chunk_samples: (device_rate as usize / 50).max(1),
            buf: Vec::new(),
            tx,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn push(&mut self, interleaved: &[i16]) {
        for frame in interleaved.chunks(self.channels) {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            self.buf.push((sum / frame.len() as i32) as i16);
        }
        while self.buf.len() >= self.chunk_samples {
            let chunk: Vec<i16> = self.buf.drain(..self.chunk_samples).collect();
            let frame = resample_linear(&chunk, self.device_rate, SAMPLE_RATE);
            if self.tx.try_send(frame).is_err() {
                tracing::debug!("mic frame dropped (consumer behind)");
            }
        }
    }
}

/// Speaker playback fed with 8 kHz mono PCM from the remote track.
pub struct SpeakerSink {
    buffer: Arc<Mutex<VecDeque<i16>>>,
    device_rate: u32,
    stop: Arc<AtomicBool>,
}

impl SpeakerSink {
    /// Open the default output device and start playback.
    ///
    /// # Errors
    /// Returns `Error::MediaAccess` if no output device is present or the
    /// stream cannot be opened.
    pub fn open() -> Result<Self> {
        let buffer = Arc::new(Mutex::new(VecDeque::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let buffer_worker = Arc::clone(&buffer);
        let stop_worker = Arc::clone(&stop);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name("voicebot-speaker".to_string())
            .spawn(move || playback_worker(&buffer_worker, &stop_worker, &ready_tx))
            .map_err(|e| Error::MediaAccess(format!("failed to spawn playback thread: {e}")))?;

        let device_rate = ready_rx
            .recv()
            .map_err(|_| Error::MediaAccess("playback thread exited during startup".to_string()))??;

        Ok(Self {
            buffer,
            device_rate,
            stop,
        })
    }
}

impl AudioSink for SpeakerSink {
    fn play(&self, frame: &[i16]) {
        let samples = resample_linear(frame, SAMPLE_RATE, self.device_rate);
        if let Ok(mut buf) = self.buffer.lock() {
            buf.extend(samples);
            let cap = self.device_rate as usize * PLAYBACK_CAP_SECS;
            let excess = buf.len().saturating_sub(cap);
            if excess > 0 {
                buf.drain(..excess);
            }
        }
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn playback_worker(
    buffer: &Arc<Mutex<VecDeque<i16>>>,
    stop: &AtomicBool,
    ready_tx: &std::sync::mpsc::Sender<Result<u32>>,
) {
    match build_playback_stream(Arc::clone(buffer)) {
        Ok((stream, device_rate)) => {
            let _ = ready_tx.send(Ok(device_rate));
            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(WORKER_POLL);
            }
            drop(stream);
        }
        Err(err) => {
            let _ = ready_tx.send(Err(err));
        }
    }
}

fn build_playback_stream(buffer: Arc<Mutex<VecDeque<i16>>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::MediaAccess("no output device available".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| Error::MediaAccess(format!("output config unavailable: {e}")))?;

    let sample_format = supported.sample_format();
    let config = supported.config();
    let channels = usize::from(config.channels).max(1);
    let device_rate = config.sample_rate.0;
    let err_fn = |err: cpal::StreamError| tracing::error!("output stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                fill_output(data, channels, &buffer, |s| s, 0);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                fill_output(
                    data,
                    channels,
                    &buffer,
                    |s| f32::from(s) / -f32::from(i16::MIN),
                    0.0,
                );
            },
            err_fn,
            None,
        ),
        other => {
            return Err(Error::MediaAccess(format!(
                "unsupported output sample format {other:?}"
            )));
        }
    }
    .map_err(|e| Error::MediaAccess(format!("failed to open output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| Error::MediaAccess(format!("failed to start output stream: {e}")))?;
    Ok((stream, device_rate))
}

fn fill_output<T: Copy>(
    data: &mut [T],
    channels: usize,
    buffer: &Mutex<VecDeque<i16>>,
    convert: impl Fn(i16) -> T,
    silence: T,
) {
    let Ok(mut buf) = buffer.lock() else {
        data.fill(silence);
        return;
    };
    for frame in data.chunks_mut(channels) {
        let sample = buf.pop_front().map_or(silence, &convert);
        for out in frame {
            *out = sample;
        }
    }
}
