use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Kind of mutation a [`MutationEvent`] describes.
///
/// The wire tags keep the vocabulary existing browser clients already listen for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    #[serde(rename = "addUser")]
    Create,
    #[serde(rename = "updateUser")]
    Update,
    #[serde(rename = "deleteUser")]
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Field values of a user record as carried by requests, responses and events.
///
/// Both fields are optional because a failed mutation still reports what the
/// client submitted, and a rejected create never received an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserPayload {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
        }
    }
}

/// One attempted create, update or delete, ready to be fanned out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationEvent {
    pub action: Action,
    #[serde(rename = "data")]
    pub payload: UserPayload,
}

impl MutationEvent {
    pub fn new(action: Action, payload: UserPayload) -> Self {
        Self { action, payload }
    }

    /// Serializes the event once so every subscriber shares the same frame.
    pub fn to_frame(&self) -> serde_json::Result<Arc<str>> {
        serde_json::to_string(self).map(Arc::from)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn frame_uses_action_and_data_fields() {
        let event = MutationEvent::new(Action::Create, UserPayload::new("u1", "Ann"));
        let frame = event.to_frame().expect("serialize event");
        let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");

        assert_eq!(
            value,
            json!({ "action": "addUser", "data": { "id": "u1", "name": "Ann" } })
        );
    }

    #[test]
    fn missing_fields_serialize_as_null() {
        let event = MutationEvent::new(
            Action::Update,
            UserPayload {
                id: None,
                name: Some("Bob".into()),
            },
        );
        let value = serde_json::to_value(&event).expect("serialize event");

        assert_eq!(value["action"], "updateUser");
        assert!(value["data"]["id"].is_null());
        assert_eq!(value["data"]["name"], "Bob");
    }

    #[test]
    fn delete_tag_parses_back() {
        let event: MutationEvent =
            serde_json::from_str(r#"{"action":"deleteUser","data":{"id":"u9"}}"#)
                .expect("parse event");

        assert_eq!(event.action, Action::Delete);
        assert_eq!(event.payload.id.as_deref(), Some("u9"));
        assert_eq!(event.payload.name, None);
        assert_eq!(event.action.to_string(), "delete");
    }
}
