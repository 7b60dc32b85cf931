use crate::Database;
use crate::models::{MediaRow, MessageRow, SidebarEntryRow, UserRow};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

/// Message timestamps are written with a fixed-width fractional second so
/// lexicographic order in SQLite matches chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Messages --

    /// Append a message. The id and creation timestamp are assigned here, and
    /// the persisted row is returned.
    pub fn insert_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<MessageRow> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, text, image_url, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                rusqlite::params![id, sender_id, receiver_id, text, image_url, created_at],
            )?;

            Ok(MessageRow {
                id: id.clone(),
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                text: text.map(str::to_string),
                image_url: image_url.map(str::to_string),
                is_read: false,
                created_at: created_at.clone(),
            })
        })
    }

    /// All messages between the unordered pair {a, b}, oldest first. Ties on
    /// the timestamp fall back to insertion order.
    pub fn conversation_between(&self, a: &str, b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, text, image_url, is_read, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([a, b], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The most recent message between the unordered pair {a, b}, if any.
    pub fn last_message_between(&self, a: &str, b: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, text, image_url, is_read, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
            )?;

            stmt.query_row([a, b], message_from_row).optional()
        })
    }

    /// Count of unread messages from `from` to `to`.
    pub fn count_unread(&self, from: &str, to: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                [from, to],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Flip every currently-unread message from `from` to `to`. Idempotent.
    pub fn mark_all_read(&self, from: &str, to: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                [from, to],
            )?;
            Ok(())
        })
    }

    /// One aggregation pass over users x messages: every user other than the
    /// viewer, annotated with the latest message timestamp for the pair and
    /// the count of their messages the viewer has not read. Sorted most
    /// recent first; users with no conversation (NULL timestamp) sort last.
    pub fn sidebar_rows(&self, viewer: &str) -> Result<Vec<SidebarEntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.created_at,
                        (SELECT MAX(m.created_at) FROM messages m
                          WHERE (m.sender_id = u.id AND m.receiver_id = ?1)
                             OR (m.sender_id = ?1 AND m.receiver_id = u.id)) AS last_message_at,
                        (SELECT COUNT(*) FROM messages m
                          WHERE m.sender_id = u.id AND m.receiver_id = ?1
                            AND m.is_read = 0) AS unread_count
                 FROM users u
                 WHERE u.id != ?1
                 ORDER BY last_message_at DESC, u.rowid ASC",
            )?;

            let rows = stmt
                .query_map([viewer], |row| {
                    Ok(SidebarEntryRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        user_created_at: row.get(2)?,
                        last_message_at: row.get(3)?,
                        unread_count: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Media --

    pub fn insert_media(&self, id: &str, owner_id: &str, size: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media (id, owner_id, size) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, owner_id, size],
            )?;
            Ok(())
        })
    }

    pub fn get_media(&self, id: &str) -> Result<Option<MediaRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, owner_id, size, created_at FROM media WHERE id = ?1")?;

            stmt.query_row([id], |row| {
                Ok(MediaRow {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    size: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .optional()
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    stmt.query_row([username], user_from_row).optional()
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE id = ?1")?;

    stmt.query_row([id], user_from_row).optional()
}

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        text: row.get(3)?,
        image_url: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
