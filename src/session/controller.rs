//! Session lifecycle and control-channel event handling.
//!
//! One [`VoiceSession`] drives one conversation at a time: `start` connects
//! and spawns the event loop, `send` pushes user input, `stop` tears the
//! transport down. Observers watch `active` and `transcript` instead of
//! polling.

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::{
    ContentPart, Item, Modality, OutputItem, Role, SessionUpdate, ToolChoice,
};
use crate::protocol::server_events::ServerEvent;
use crate::{Error, Result};

use super::channel::{ChannelSignal, Connection, Connector, ControlChannel, TransportHandle};
use super::registry::{FunctionCall, FunctionRegistry};

/// A local file to attach to the conversation. Attachments upload
/// independently of the message that referenced them; arrival order is not
/// guaranteed.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
}

/// Session configuration pushed to the service when the channel opens.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub instructions: String,
    pub modalities: Vec<Modality>,
    pub tool_choice: ToolChoice,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            instructions: String::new(),
            modalities: vec![Modality::Audio, Modality::Text],
            tool_choice: ToolChoice::Auto,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Active,
}

struct SessionState {
    phase: Phase,
    channel: Option<Arc<dyn ControlChannel>>,
    transport: Option<Arc<dyn TransportHandle>>,
    task: Option<JoinHandle<()>>,
}

pub struct VoiceSession {
    connector: Arc<dyn Connector>,
    registry: Arc<FunctionRegistry>,
    settings: SessionSettings,
    state: Arc<Mutex<SessionState>>,
    active_tx: watch::Sender<bool>,
    transcript_tx: watch::Sender<String>,
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession").finish_non_exhaustive()
    }
}

impl VoiceSession {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        registry: FunctionRegistry,
        settings: SessionSettings,
    ) -> Self {
        let (active_tx, _) = watch::channel(false);
        let (transcript_tx, _) = watch::channel(String::new());
        Self {
            connector,
            registry: Arc::new(registry),
            settings,
            state: Arc::new(Mutex::new(SessionState {
                phase: Phase::Idle,
                channel: None,
                transport: None,
                task: None,
            })),
            active_tx,
            transcript_tx,
        }
    }

    /// Whether the control channel is currently open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.active_tx.borrow()
    }

    /// Watch the active flag. Flips true when the channel opens and false
    /// on any teardown.
    #[must_use]
    pub fn active(&self) -> watch::Receiver<bool> {
        self.active_tx.subscribe()
    }

    /// Watch the assistant transcript. Each completed utterance replaces the
    /// previous value; the transcript is a snapshot, not an accumulation.
    #[must_use]
    pub fn transcript(&self) -> watch::Receiver<String> {
        self.transcript_tx.subscribe()
    }

    /// Connect and spawn the event loop. Calling `start` on a session that
    /// is already starting or active is a logged no-op.
    ///
    /// # Errors
    /// Returns the connect error if session setup fails; the session stays
    /// idle and can be started again.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Idle {
                tracing::warn!("start ignored: session already starting or active");
                return Ok(());
            }
            state.phase = Phase::Starting;
        }

        let connection = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(err) => {
                self.state.lock().await.phase = Phase::Idle;
                return Err(err);
            }
        };

        let Connection {
            channel,
            signals,
            transport,
        } = connection;

        let task = tokio::spawn(run_event_loop(
            signals,
            Arc::clone(&channel),
            Arc::clone(&self.registry),
            self.settings.clone(),
            self.active_tx.clone(),
            self.transcript_tx.clone(),
            Arc::clone(&self.state),
        ));

        let mut state = self.state.lock().await;
        if state.phase != Phase::Starting {
            // stop() landed while we were connecting; tear down what we
            // just built instead of resurrecting the session.
            drop(state);
            task.abort();
            if let Err(err) = channel.close().await {
                tracing::debug!("channel close failed: {err}");
            }
            if let Err(err) = transport.close().await {
                tracing::debug!("transport close failed: {err}");
            }
            let _ = self.active_tx.send(false);
            return Ok(());
        }
        state.phase = Phase::Active;
        state.channel = Some(channel);
        state.transport = Some(transport);
        state.task = Some(task);
        Ok(())
    }

    /// Tear the session down. Safe to call repeatedly or on an idle session.
    pub async fn stop(&self) {
        let (channel, transport, task) = {
            let mut state = self.state.lock().await;
            state.phase = Phase::Idle;
            (
                state.channel.take(),
                state.transport.take(),
                state.task.take(),
            )
        };

        if let Some(task) = task {
            task.abort();
        }
        if let Some(channel) = channel {
            if let Err(err) = channel.close().await {
                tracing::debug!("channel close failed: {err}");
            }
        }
        if let Some(transport) = transport {
            if let Err(err) = transport.close().await {
                tracing::debug!("transport close failed: {err}");
            }
        }
        let _ = self.active_tx.send(false);
    }

    /// Send a user message and request a response. Attachments are read and
    /// uploaded in independent tasks; failures there are logged, not
    /// returned.
    ///
    /// Sending while the session is not active is a logged no-op.
    ///
    /// # Errors
    /// Returns an error if the message itself cannot be sent.
    pub async fn send(&self, text: &str, attachments: Vec<Attachment>) -> Result<()> {
        let channel = {
            let state = self.state.lock().await;
            state.channel.clone()
        };
        let Some(channel) = channel.filter(|c| c.is_open()) else {
            tracing::warn!("send ignored: session is not active");
            return Ok(());
        };

        if !text.is_empty() {
            let item = Item::Message {
                role: Role::User,
                content: vec![ContentPart::InputText {
                    text: text.to_string(),
                }],
            };
            channel
                .send(ClientEvent::ConversationItemCreate {
                    item: Box::new(item),
                })
                .await?;
            channel.send(ClientEvent::ResponseCreate).await?;
        }

        for attachment in attachments {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move {
                if let Err(err) = send_attachment(channel.as_ref(), &attachment).await {
                    tracing::error!(name = %attachment.name, "attachment send failed: {err}");
                }
            });
        }
        Ok(())
    }
}

async fn run_event_loop(
    mut signals: mpsc::Receiver<ChannelSignal>,
    channel: Arc<dyn ControlChannel>,
    registry: Arc<FunctionRegistry>,
    settings: SessionSettings,
    active_tx: watch::Sender<bool>,
    transcript_tx: watch::Sender<String>,
    state: Arc<Mutex<SessionState>>,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            ChannelSignal::Open => {
                let _ = active_tx.send(true);
                if let Err(err) = configure_session(channel.as_ref(), &registry, &settings).await {
                    tracing::error!("session configuration failed: {err}");
                }
            }
            ChannelSignal::Message(event) => {
                handle_server_event(event, channel.as_ref(), &registry, &transcript_tx).await;
            }
            ChannelSignal::Closed => break,
        }
    }

    let _ = active_tx.send(false);
    if let Some(transport) = self_cleanup(&state).await {
        if let Err(err) = transport.close().await {
            tracing::debug!("transport close failed: {err}");
        }
    }
}

/// Reset shared state after the signal stream ends, unless `stop` already
/// did. Returns the transport still needing teardown, if any.
async fn self_cleanup(state: &Arc<Mutex<SessionState>>) -> Option<Arc<dyn TransportHandle>> {
    let mut guard = state.lock().await;
    if guard.phase != Phase::Active {
        return None;
    }
    guard.phase = Phase::Idle;
    guard.channel = None;
    guard.task = None;
    guard.transport.take()
}

async fn configure_session(
    channel: &dyn ControlChannel,
    registry: &FunctionRegistry,
    settings: &SessionSettings,
) -> Result<()> {
    let update = SessionUpdate {
        modalities: settings.modalities.clone(),
        tool_choice: settings.tool_choice,
        tools: registry.tools()?,
        instructions: settings.instructions.clone(),
    };
    channel
        .send(ClientEvent::SessionUpdate {
            session: Box::new(update),
        })
        .await
}

async fn handle_server_event(
    event: ServerEvent,
    channel: &dyn ControlChannel,
    registry: &FunctionRegistry,
    transcript_tx: &watch::Sender<String>,
) {
    match event {
        ServerEvent::AudioTranscriptDone { transcript, .. } => {
            let _ = transcript_tx.send(transcript);
        }
        ServerEvent::ResponseDone { response, .. } => {
            for item in response.output {
                if let OutputItem::FunctionCall {
                    name,
                    call_id,
                    arguments,
                } = item
                {
                    run_function_call(channel, registry, name, call_id, &arguments).await;
                }
            }
        }
        ServerEvent::Unknown(_) => {}
    }
}

/// Dispatch one function call and feed the result back to the conversation.
/// An unregistered name is ignored; a failed handler is logged and produces
/// no output item.
async fn run_function_call(
    channel: &dyn ControlChannel,
    registry: &FunctionRegistry,
    name: String,
    call_id: String,
    arguments: &str,
) {
    let arguments = match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!("function {name}: malformed arguments: {err}");
            return;
        }
    };

    let result = registry
        .dispatch(FunctionCall {
            name: name.clone(),
            call_id,
            arguments,
        })
        .await;

    match result {
        Ok(output) => {
            if !channel.is_open() {
                tracing::debug!("function {name} result dropped: channel closed");
                return;
            }
            let item = Item::FunctionCallOutput {
                call_id: output.call_id,
                output: output.output.to_string(),
            };
            if let Err(err) = channel
                .send(ClientEvent::ConversationItemCreate {
                    item: Box::new(item),
                })
                .await
            {
                tracing::error!("function {name}: output send failed: {err}");
                return;
            }
            if let Err(err) = channel.send(ClientEvent::ResponseCreate).await {
                tracing::error!("function {name}: follow-up request failed: {err}");
            }
        }
        Err(Error::UnregisteredFunction(name)) => {
            tracing::debug!("ignoring call to unregistered function {name}");
        }
        Err(err) => {
            tracing::error!("function {name} failed: {err}");
        }
    }
}

async fn send_attachment(channel: &dyn ControlChannel, attachment: &Attachment) -> Result<()> {
    let bytes = tokio::fs::read(&attachment.path).await?;
    let content = general_purpose::STANDARD.encode(&bytes);
    if !channel.is_open() {
        tracing::debug!(name = %attachment.name, "attachment dropped: channel closed");
        return Ok(());
    }
    channel
        .send(ClientEvent::ConversationItemCreate {
            item: Box::new(Item::File {
                name: attachment.name.clone(),
                content,
            }),
        })
        .await
}
