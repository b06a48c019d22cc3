//! Peer connection assembly.
//!
//! Builds the peer connection with a PCMU uplink track and the `oai-events`
//! data channel, pumps microphone frames out and remote audio into the sink,
//! and bridges data-channel traffic into [`ChannelSignal`]s.
//!
//! The data channel is created before the offer so its description is part
//! of the initial SDP.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_PCMU, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::media::{
    AudioSink, AudioSource, BoxFuture, FRAME_MS, SAMPLE_RATE, ulaw_decode, ulaw_encode,
};
use crate::protocol::client_events::ClientEvent;
use crate::protocol::server_events::ServerEvent;
use crate::session::channel::{ChannelSignal, Connection, ControlChannel, TransportHandle};
use crate::{Error, Result};

/// Control channel label the realtime endpoint expects.
const CHANNEL_LABEL: &str = "oai-events";
const SIGNAL_QUEUE: usize = 64;

/// Assembles a [`WebRtcTransport`] from a microphone source and speaker sink.
pub struct TransportBuilder {
    source: Box<dyn AudioSource>,
    sink: Arc<dyn AudioSink>,
}

impl TransportBuilder {
    pub fn new(source: impl AudioSource + 'static, sink: impl AudioSink + 'static) -> Self {
        Self {
            source: Box::new(source),
            sink: Arc::new(sink),
        }
    }

    /// Build the peer connection, tracks and data channel. The connection is
    /// not negotiated yet; follow with [`WebRtcTransport::create_offer`] and
    /// [`WebRtcTransport::apply_answer`].
    ///
    /// # Errors
    /// Returns an error if the peer connection or its tracks cannot be set up.
    pub async fn build(self) -> Result<WebRtcTransport> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await?,
        );

        let (signal_tx, signals) = mpsc::channel(SIGNAL_QUEUE);
        let dc = pc.create_data_channel(CHANNEL_LABEL, None).await?;
        wire_channel_callbacks(&dc, &signal_tx);
        wire_connection_state(&pc, &signal_tx);

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_PCMU.to_owned(),
                clock_rate: SAMPLE_RATE,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            "voicebot-mic".to_owned(),
        ));
        let sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // Drain RTCP so the interceptors keep running.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        spawn_uplink_pump(self.source, track);
        wire_remote_playback(&pc, Arc::clone(&self.sink));

        Ok(WebRtcTransport {
            pc,
            dc,
            signals,
        })
    }
}

/// A built but not yet negotiated peer connection.
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    dc: Arc<RTCDataChannel>,
    signals: mpsc::Receiver<ChannelSignal>,
}

impl WebRtcTransport {
    /// Create the local offer and wait for ICE gathering to finish so the
    /// SDP carries every candidate.
    ///
    /// # Errors
    /// Returns an error if offer creation or gathering fails.
    pub async fn create_offer(&self) -> Result<String> {
        let offer = self.pc.create_offer(None).await?;
        let mut gathered = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(offer).await?;
        let _ = gathered.recv().await;
        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| Error::Negotiation("no local description after gathering".to_string()))?;
        Ok(local.sdp)
    }

    /// Apply the remote SDP answer.
    ///
    /// # Errors
    /// Returns an error if the answer is not a valid session description.
    pub async fn apply_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::Negotiation(format!("unusable SDP answer: {e}")))?;
        self.pc.set_remote_description(answer).await?;
        Ok(())
    }

    /// Tear down the peer connection. Used when negotiation fails partway.
    pub async fn close(&self) {
        if let Err(err) = self.pc.close().await {
            tracing::debug!("peer connection close failed: {err}");
        }
    }

    /// Hand the negotiated transport to the session layer.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        Connection {
            channel: Arc::new(DataChannelHandle { dc: self.dc }),
            signals: self.signals,
            transport: Arc::new(PeerHandle { pc: self.pc }),
        }
    }
}

fn wire_channel_callbacks(dc: &Arc<RTCDataChannel>, signal_tx: &mpsc::Sender<ChannelSignal>) {
    let tx = signal_tx.clone();
    dc.on_open(Box::new(move || {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ChannelSignal::Open).await;
        })
    }));

    let tx = signal_tx.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        Box::pin(async move {
            match serde_json::from_slice::<ServerEvent>(&msg.data) {
                Ok(event) => {
                    tracing::trace!("received {} byte event", msg.data.len());
                    let _ = tx.send(ChannelSignal::Message(event)).await;
                }
                Err(err) => tracing::warn!("discarding non-JSON channel message: {err}"),
            }
        })
    }));

    let tx = signal_tx.clone();
    dc.on_close(Box::new(move || {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ChannelSignal::Closed).await;
        })
    }));

    // An errored stream does not always get a close callback, so the error
    // path must tear the session down too. Duplicate Closed signals are
    // harmless; the event loop exits on the first one.
    let tx = signal_tx.clone();
    dc.on_error(Box::new(move |err| {
        let tx = tx.clone();
        Box::pin(async move {
            tracing::error!("control channel error: {err}");
            let _ = tx.send(ChannelSignal::Closed).await;
        })
    }));
}

/// States from which the peer connection cannot carry traffic again.
const fn is_terminal_peer_state(state: RTCPeerConnectionState) -> bool {
    matches!(
        state,
        RTCPeerConnectionState::Failed
            | RTCPeerConnectionState::Disconnected
            | RTCPeerConnectionState::Closed
    )
}

fn wire_connection_state(pc: &Arc<RTCPeerConnection>, signal_tx: &mpsc::Sender<ChannelSignal>) {
    let tx = signal_tx.clone();
    pc.on_peer_connection_state_change(Box::new(move |state| {
        let tx = tx.clone();
        Box::pin(async move {
            tracing::debug!("peer connection state: {state}");
            if is_terminal_peer_state(state) {
                let _ = tx.send(ChannelSignal::Closed).await;
            }
        })
    }));
}

/// Encode microphone frames to µ-law and write them to the uplink track
/// until the source runs dry.
fn spawn_uplink_pump(mut source: Box<dyn AudioSource>, track: Arc<TrackLocalStaticSample>) {
    tokio::spawn(async move {
        let frame_duration = Duration::from_millis(u64::from(FRAME_MS));
        while let Some(frame) = source.next_frame().await {
            let sample = Sample {
                data: Bytes::from(ulaw_encode(&frame)),
                duration: frame_duration,
                ..Default::default()
            };
            if let Err(err) = track.write_sample(&sample).await {
                tracing::debug!("uplink track closed: {err}");
                break;
            }
        }
        tracing::debug!("microphone source finished");
    });
}

fn wire_remote_playback(pc: &Arc<RTCPeerConnection>, sink: Arc<dyn AudioSink>) {
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>, _: Arc<RTCRtpReceiver>, _: Arc<RTCRtpTransceiver>| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                tracing::debug!("remote audio track started");
                loop {
                    match track.read_rtp().await {
                        Ok((packet, _)) => {
                            if packet.payload.is_empty() {
                                continue;
                            }
                            sink.play(&ulaw_decode(&packet.payload));
                        }
                        Err(err) => {
                            tracing::debug!("remote audio track ended: {err}");
                            break;
                        }
                    }
                }
            })
        },
    ));
}

struct DataChannelHandle {
    dc: Arc<RTCDataChannel>,
}

impl ControlChannel for DataChannelHandle {
    fn send(&self, event: ClientEvent) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.dc.ready_state() != RTCDataChannelState::Open {
                return Err(Error::ConnectionClosed);
            }
            let text = serde_json::to_string(&event)?;
            tracing::trace!("sending event: {text}");
            self.dc.send_text(text).await?;
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.dc.close().await?;
            Ok(())
        })
    }
}

struct PeerHandle {
    pc: Arc<RTCPeerConnection>,
}

impl TransportHandle for PeerHandle {
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.pc.close().await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_peer_states_force_teardown() {
        assert!(is_terminal_peer_state(RTCPeerConnectionState::Failed));
        assert!(is_terminal_peer_state(RTCPeerConnectionState::Disconnected));
        assert!(is_terminal_peer_state(RTCPeerConnectionState::Closed));
    }

    #[test]
    fn live_peer_states_do_not() {
        assert!(!is_terminal_peer_state(RTCPeerConnectionState::New));
        assert!(!is_terminal_peer_state(RTCPeerConnectionState::Connecting));
        assert!(!is_terminal_peer_state(RTCPeerConnectionState::Connected));
    }
}
