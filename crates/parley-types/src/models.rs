use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// What a message carries. Modeled as a closed set of variants so every
/// consumer has to handle all three shapes — a message with neither text nor
/// an image cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: String },
    Image { image_url: String },
    Mixed { text: String, image_url: String },
}

impl MessageBody {
    /// Build a body from optional parts. Empty or whitespace-only text counts
    /// as absent. Returns `None` when neither part is meaningfully present.
    pub fn from_parts(text: Option<String>, image_url: Option<String>) -> Option<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        let image_url = image_url.filter(|u| !u.is_empty());

        match (text, image_url) {
            (Some(text), None) => Some(Self::Text { text }),
            (None, Some(image_url)) => Some(Self::Image { image_url }),
            (Some(text), Some(image_url)) => Some(Self::Mixed { text, image_url }),
            (None, None) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::Mixed { text, .. } => Some(text),
            Self::Image { .. } => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Image { image_url } | Self::Mixed { image_url, .. } => Some(image_url),
            Self::Text { .. } => None,
        }
    }
}

/// A persisted direct message. `is_read` is flipped by mark-as-read only;
/// nothing else ever mutates a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(flatten)]
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_from_parts_rejects_empty() {
        assert_eq!(MessageBody::from_parts(None, None), None);
        assert_eq!(MessageBody::from_parts(Some("   ".into()), None), None);
        assert_eq!(MessageBody::from_parts(Some(String::new()), Some(String::new())), None);
    }

    #[test]
    fn body_from_parts_picks_variant() {
        assert_eq!(
            MessageBody::from_parts(Some("hi".into()), None),
            Some(MessageBody::Text { text: "hi".into() })
        );
        assert_eq!(
            MessageBody::from_parts(None, Some("/media/abc".into())),
            Some(MessageBody::Image { image_url: "/media/abc".into() })
        );
        assert_eq!(
            MessageBody::from_parts(Some("look".into()), Some("/media/abc".into())),
            Some(MessageBody::Mixed { text: "look".into(), image_url: "/media/abc".into() })
        );
    }

    #[test]
    fn message_serializes_body_inline() {
        let msg = Message {
            id: Uuid::nil(),
            sender_id: Uuid::nil(),
            receiver_id: Uuid::nil(),
            body: MessageBody::Text { text: "hi".into() },
            created_at: DateTime::UNIX_EPOCH,
            is_read: false,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["is_read"], false);
    }
}
