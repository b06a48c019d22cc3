//! Exercises the public session surface with a scripted connector, the way
//! an embedding application would use the crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use voicebot_rtc::media::BoxFuture;
use voicebot_rtc::protocol::models::{OutputItem, Response};
use voicebot_rtc::{
    Attachment, ChannelSignal, ClientEvent, Connection, Connector, ControlChannel, Error, Item,
    Result, ServerEvent, SessionSettings, TransportHandle, VoiceSession, functions,
};

const WAIT: Duration = Duration::from_secs(1);

struct ScriptedChannel {
    outgoing: mpsc::UnboundedSender<ClientEvent>,
    open: AtomicBool,
}

impl ControlChannel for ScriptedChannel {
    fn send(&self, event: ClientEvent) -> BoxFuture<'_, Result<()>> {
        let sent = self.outgoing.send(event).is_ok();
        Box::pin(async move {
            if sent {
                Ok(())
            } else {
                Err(Error::ConnectionClosed)
            }
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        self.open.store(false, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

struct ScriptedTransport;

impl TransportHandle for ScriptedTransport {
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

struct ScriptedConnector {
    signals: std::sync::Mutex<Option<mpsc::Receiver<ChannelSignal>>>,
    channel: Arc<ScriptedChannel>,
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Connection> {
        let signals = self
            .signals
            .lock()
            .unwrap()
            .take()
            .ok_or(Error::ConnectionClosed)?;
        Ok(Connection {
            channel: Arc::clone(&self.channel) as Arc<dyn ControlChannel>,
            signals,
            transport: Arc::new(ScriptedTransport),
        })
    }
}

fn scripted_session() -> (
    VoiceSession,
    mpsc::Sender<ChannelSignal>,
    mpsc::UnboundedReceiver<ClientEvent>,
) {
    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(ScriptedConnector {
        signals: std::sync::Mutex::new(Some(signal_rx)),
        channel: Arc::new(ScriptedChannel {
            outgoing: out_tx,
            open: AtomicBool::new(true),
        }),
    });

    let session = VoiceSession::builder()
        .connector(connector)
        .instructions("You are a helpful assistant.")
        .functions(functions::builtins(functions::DEFAULT_SIGNUP_URL))
        .build()
        .unwrap();

    (session, signal_tx, out_rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("channel closed")
}

#[tokio::test]
async fn full_turn_configures_dispatches_and_replies() {
    let (session, signal_tx, mut out_rx) = scripted_session();
    session.start().await.unwrap();

    signal_tx.send(ChannelSignal::Open).await.unwrap();
    match next_event(&mut out_rx).await {
        ClientEvent::SessionUpdate { session } => {
            assert_eq!(session.instructions, "You are a helpful assistant.");
            assert_eq!(session.tools.len(), 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let done = ServerEvent::ResponseDone {
        event_id: None,
        response: Response {
            id: Some("resp_1".to_string()),
            output: vec![OutputItem::FunctionCall {
                name: "get_weather".to_string(),
                call_id: "call_1".to_string(),
                arguments: r#"{"location":"Austin, TX"}"#.to_string(),
            }],
        },
    };
    signal_tx.send(ChannelSignal::Message(done)).await.unwrap();

    match next_event(&mut out_rx).await {
        ClientEvent::ConversationItemCreate { item } => match *item {
            Item::FunctionCallOutput { call_id, output } => {
                assert_eq!(call_id, "call_1");
                let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
                assert_eq!(parsed, json!({"temp": 72, "condition": "Sunny"}));
            }
            other => panic!("unexpected item: {other:?}"),
        },
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        next_event(&mut out_rx).await,
        ClientEvent::ResponseCreate
    ));

    session.stop().await;
    assert!(!session.is_active());
}

#[tokio::test]
async fn attachment_uploads_as_file_item() {
    let dir = std::env::temp_dir();
    let path = dir.join("voicebot-attachment-test.txt");
    tokio::fs::write(&path, b"hello").await.unwrap();

    let (session, signal_tx, mut out_rx) = scripted_session();
    session.start().await.unwrap();
    signal_tx.send(ChannelSignal::Open).await.unwrap();
    let _ = next_event(&mut out_rx).await; // session.update

    session
        .send(
            "",
            vec![Attachment {
                name: "notes.txt".to_string(),
                path: path.clone(),
            }],
        )
        .await
        .unwrap();

    match next_event(&mut out_rx).await {
        ClientEvent::ConversationItemCreate { item } => match *item {
            Item::File { name, content } => {
                assert_eq!(name, "notes.txt");
                assert_eq!(content, "aGVsbG8=");
            }
            other => panic!("unexpected item: {other:?}"),
        },
        other => panic!("unexpected event: {other:?}"),
    }

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn default_settings_match_documented_values() {
    let settings = SessionSettings::default();
    assert!(settings.instructions.is_empty());
    assert_eq!(settings.modalities.len(), 2);
}
