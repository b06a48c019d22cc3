use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::models::{ArbitraryJson, Response};

/// Events the session controller consumes. Anything else the service emits
/// lands in `Unknown` and passes through unhandled.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Full transcript snapshot for the latest utterance (not a delta).
    AudioTranscriptDone {
        event_id: Option<String>,
        transcript: String,
    },
    /// Response finished; output items may contain function calls.
    ResponseDone {
        event_id: Option<String>,
        response: Response,
    },
    Unknown(ArbitraryJson),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ServerEventRepr {
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        transcript: String,
    },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        response: Response,
    },
}

impl From<ServerEventRepr> for ServerEvent {
    fn from(repr: ServerEventRepr) -> Self {
        match repr {
            ServerEventRepr::AudioTranscriptDone {
                event_id,
                transcript,
            } => Self::AudioTranscriptDone {
                event_id,
                transcript,
            },
            ServerEventRepr::ResponseDone { event_id, response } => {
                Self::ResponseDone { event_id, response }
            }
        }
    }
}

impl Serialize for ServerEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown(value) => value.serialize(serializer),
            Self::AudioTranscriptDone {
                event_id,
                transcript,
            } => ServerEventRepr::AudioTranscriptDone {
                event_id: event_id.clone(),
                transcript: transcript.clone(),
            }
            .serialize(serializer),
            Self::ResponseDone { event_id, response } => ServerEventRepr::ResponseDone {
                event_id: event_id.clone(),
                response: response.clone(),
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ServerEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ServerEventRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::trace!("unhandled server event: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transcript_done_parses() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "response.audio_transcript.done",
            "event_id": "evt_1",
            "transcript": "Hello there"
        }))
        .unwrap();

        match event {
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                assert_eq!(transcript, "Hello there");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_event_type_becomes_unknown() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "input_audio_buffer.speech_started",
            "audio_start_ms": 120
        }))
        .unwrap();
        assert!(matches!(event, ServerEvent::Unknown(_)));
    }

    #[test]
    fn malformed_known_event_becomes_unknown() {
        // response.done without a response payload must not fail parsing.
        let event: ServerEvent =
            serde_json::from_value(json!({"type": "response.done"})).unwrap();
        assert!(matches!(event, ServerEvent::Unknown(_)));
    }
}
