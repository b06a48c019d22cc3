//! Audio capture and playback plumbed into the transport.
//!
//! The negotiated media codec is G.711 µ-law (PCMU): 8 kHz mono, one byte
//! per sample. Devices are driven by CPAL on dedicated threads; frames cross
//! into async land over channels.

mod device;
mod g711;
mod resample;

pub use device::{MicSource, SpeakerSink};
pub use futures::future::BoxFuture;
pub use g711::{ulaw_decode, ulaw_encode};
pub(crate) use resample::resample_linear;

/// Sample rate of the negotiated PCMU track.
pub const SAMPLE_RATE: u32 = 8_000;

/// Packetization interval for outbound audio.
pub const FRAME_MS: u32 = 20;

/// Samples per outbound frame (8 kHz mono, 20 ms).
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize / 1000) * FRAME_MS as usize;

/// Pull-side of the microphone: yields 8 kHz mono PCM frames, `None` once
/// the device stops producing.
pub trait AudioSource: Send {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Vec<i16>>>;
}

/// Push-side of the speaker: accepts 8 kHz mono PCM decoded from the remote
/// track. Implementations must tolerate bursts (buffer or drop).
pub trait AudioSink: Send + Sync {
    fn play(&self, frame: &[i16]);
}
