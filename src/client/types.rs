//! Wire types exchanged with the evaluation client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User a variable or feature is evaluated for.
///
/// Only `user_id` is required; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub user_id: String,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: Map::new(),
        }
    }
}

/// A resolved variable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Variable {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub key: String,

    #[serde(rename = "type")]
    pub variable_type: String,

    pub value: Value,

    /// True when no targeting matched and the caller's default would be used.
    #[serde(skip)]
    pub defaulted: bool,
}

impl Variable {
    /// A variable the client could not resolve.
    pub fn defaulted(key: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            variable_type: String::new(),
            value: Value::Null,
            defaulted: true,
        }
    }
}

/// A feature and the variation the user was bucketed into.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Feature {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub key: String,

    #[serde(rename = "type", default)]
    pub feature_type: String,

    #[serde(rename = "_variation", default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<String>,

    #[serde(rename = "variationKey", default, skip_serializing_if = "Option::is_none")]
    pub variation_key: Option<String>,

    #[serde(rename = "variationName", default, skip_serializing_if = "Option::is_none")]
    pub variation_name: Option<String>,
}

/// A custom analytics event.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(rename = "metaData", default, skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<Map<String, Value>>,
}

/// Body of `/v1/track` and `/v1/events`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserEventsBody {
    pub user: User,

    #[serde(default)]
    pub events: Vec<Event>,
}

/// The raw configuration document plus its cache validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConfig {
    pub body: Bytes,
    pub etag: String,
    pub last_modified: String,
}

/// One push-protocol message, published verbatim to stream subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    pub data: String,
}

impl PushEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
        }
    }
}

/// Notifications emitted by the evaluation client on its event sink.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// First configuration loaded.
    Initialized,
    /// A new configuration document replaced the previous one.
    ConfigUpdated { etag: String },
    /// A realtime update that subscribers of this instance should receive.
    RealtimeUpdate(PushEvent),
    /// A background failure inside the client.
    Error(String),
}

impl ClientEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Initialized => "initialized",
            ClientEvent::ConfigUpdated { .. } => "configUpdated",
            ClientEvent::RealtimeUpdate(_) => "realtimeUpdates",
            ClientEvent::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_keeps_unknown_fields() {
        let user: User =
            serde_json::from_value(json!({"user_id": "u1", "email": "a@b.c", "customData": {"x": 1}}))
                .unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.attributes["email"], "a@b.c");

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["customData"]["x"], 1);
    }

    #[test]
    fn user_requires_user_id() {
        assert!(serde_json::from_value::<User>(json!({"email": "a@b.c"})).is_err());
        assert!(serde_json::from_value::<User>(json!(["u1"])).is_err());
    }

    #[test]
    fn variable_serializes_without_defaulted_flag() {
        let variable = Variable {
            id: Some("61".to_string()),
            key: "my-key".to_string(),
            variable_type: "Boolean".to_string(),
            value: json!(true),
            defaulted: false,
        };
        assert_eq!(
            serde_json::to_value(&variable).unwrap(),
            json!({"_id": "61", "key": "my-key", "type": "Boolean", "value": true})
        );
    }
}
