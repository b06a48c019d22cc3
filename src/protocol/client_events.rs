use serde::{Deserialize, Serialize};

use super::models::{Item, SessionUpdate};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Box<SessionUpdate> },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: Box<Item> },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::{ContentPart, Role};
    use serde_json::json;

    #[test]
    fn response_create_is_bare_type_tag() {
        let value = serde_json::to_value(ClientEvent::ResponseCreate).unwrap();
        assert_eq!(value, json!({"type": "response.create"}));
    }

    #[test]
    fn user_message_item_wire_shape() {
        let event = ClientEvent::ConversationItemCreate {
            item: Box::new(Item::Message {
                role: Role::User,
                content: vec![ContentPart::InputText {
                    text: "hi".to_string(),
                }],
            }),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("conversation.item.create"));
        assert_eq!(value["item"]["type"], json!("message"));
        assert_eq!(value["item"]["role"], json!("user"));
        assert_eq!(value["item"]["content"][0]["type"], json!("input_text"));
        assert_eq!(value["item"]["content"][0]["text"], json!("hi"));
    }

    #[test]
    fn function_call_output_wire_shape() {
        let event = ClientEvent::ConversationItemCreate {
            item: Box::new(Item::FunctionCallOutput {
                call_id: "c1".to_string(),
                output: "{\"ok\":true}".to_string(),
            }),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["item"]["type"], json!("function_call_output"));
        assert_eq!(value["item"]["call_id"], json!("c1"));
        assert_eq!(value["item"]["output"], json!("{\"ok\":true}"));
    }
}
