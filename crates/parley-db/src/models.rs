//! Database row types — these map directly to SQLite rows.
//! Conversions into the shared API models live here so the parsing fallbacks
//! are defined once, next to the storage format they decode.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use parley_types::api::SidebarRow;
use parley_types::models::{Message, MessageBody, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

/// One aggregated sidebar entry: a counterpart user plus recency and unread
/// count relative to the viewer. `last_message_at` is NULL when the pair has
/// never exchanged a message.
pub struct SidebarEntryRow {
    pub user_id: String,
    pub username: String,
    pub user_created_at: String,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
}

pub struct MediaRow {
    pub id: String,
    pub owner_id: String,
    pub size: i64,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        let body = MessageBody::from_parts(self.text, self.image_url)
            .ok_or_else(|| anyhow!("message {} has neither text nor image", self.id))?;

        Ok(Message {
            id: self.id.parse()?,
            sender_id: self.sender_id.parse()?,
            receiver_id: self.receiver_id.parse()?,
            body,
            created_at: parse_timestamp(&self.created_at)?,
            is_read: self.is_read,
        })
    }
}

impl SidebarEntryRow {
    /// A counterpart with no conversation yet gets the epoch timestamp, which
    /// sorts after every real message.
    pub fn into_row(self) -> Result<SidebarRow> {
        let last_message_at = match self.last_message_at {
            Some(raw) => parse_timestamp(&raw)?,
            None => DateTime::UNIX_EPOCH,
        };

        Ok(SidebarRow {
            user: User {
                id: self.user_id.parse()?,
                username: self.username,
                created_at: parse_timestamp(&self.user_created_at)?,
            },
            last_message_at,
            unread_count: self.unread_count,
        })
    }
}

/// Parse a stored timestamp. Message rows carry RFC 3339 with microseconds;
/// rows created by SQLite's `datetime('now')` default are naive
/// "YYYY-MM-DD HH:MM:SS" in UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("bad timestamp '{}': {}", raw, e))
}
