use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw JSON preserved for payloads we deliberately keep untyped.
pub type ArbitraryJson = Value;

/// JSON Schema for function parameters (intentionally untyped; schemas are
/// passed through to the service unmodified).
pub type JsonSchema = Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Audio,
    Text,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    Function {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        parameters: JsonSchema,
    },
}

/// Session configuration sent once on channel open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub modalities: Vec<Modality>,
    pub tool_choice: ToolChoice,
    pub tools: Vec<Tool>,
    pub instructions: String,
}

/// Content of a user message item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

/// Items the client creates on the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    Message {
        role: Role,
        content: Vec<ContentPart>,
    },
    File {
        name: String,
        /// Base64-encoded file body.
        content: String,
    },
    FunctionCallOutput {
        call_id: String,
        /// JSON-encoded handler result.
        output: String,
    },
}

/// A completed response as reported by `response.done`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

/// Output items inside a completed response. Only function calls are acted
/// on; everything else is preserved as raw JSON and ignored.
#[derive(Debug, Clone)]
pub enum OutputItem {
    FunctionCall {
        name: String,
        call_id: String,
        /// JSON-encoded argument object.
        arguments: String,
    },
    Unknown(ArbitraryJson),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItemRepr {
    FunctionCall {
        name: String,
        call_id: String,
        arguments: String,
    },
}

impl Serialize for OutputItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Unknown(value) => value.serialize(serializer),
            Self::FunctionCall {
                name,
                call_id,
                arguments,
            } => OutputItemRepr::FunctionCall {
                name: name.clone(),
                call_id: call_id.clone(),
                arguments: arguments.clone(),
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OutputItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match OutputItemRepr::deserialize(value.clone()) {
            Ok(OutputItemRepr::FunctionCall {
                name,
                call_id,
                arguments,
            }) => Ok(Self::FunctionCall {
                name,
                call_id,
                arguments,
            }),
            Err(_) => Ok(Self::Unknown(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_update_wire_shape() {
        let update = SessionUpdate {
            modalities: vec![Modality::Audio, Modality::Text],
            tool_choice: ToolChoice::Auto,
            tools: vec![Tool::Function {
                name: "get_weather".to_string(),
                description: Some("Get current weather for a location".to_string()),
                parameters: json!({"type": "object"}),
            }],
            instructions: "Be brief.".to_string(),
        };

        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["modalities"], json!(["audio", "text"]));
        assert_eq!(value["tool_choice"], json!("auto"));
        assert_eq!(value["tools"][0]["type"], json!("function"));
        assert_eq!(value["instructions"], json!("Be brief."));
    }

    #[test]
    fn response_output_parses_function_calls_and_tolerates_rest() {
        let body = json!({
            "id": "resp_1",
            "output": [
                {"type": "message", "role": "assistant", "content": []},
                {"type": "function_call", "name": "get_weather",
                 "call_id": "c1", "arguments": "{\"location\":\"Austin, TX\"}"}
            ]
        });

        let response: Response = serde_json::from_value(body).unwrap();
        assert_eq!(response.output.len(), 2);
        assert!(matches!(response.output[0], OutputItem::Unknown(_)));
        match &response.output[1] {
            OutputItem::FunctionCall { name, call_id, .. } => {
                assert_eq!(name, "get_weather");
                assert_eq!(call_id, "c1");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn response_without_output_defaults_empty() {
        let response: Response = serde_json::from_value(json!({"id": "resp_2"})).unwrap();
        assert!(response.output.is_empty());
    }
}
