//! Read-only access to the Messages chat.db database.
//!
//! Every query opens a fresh read-only connection with a short busy
//! timeout, so a momentarily locked store degrades into a skipped poll
//! tick instead of an error cascade.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

use crate::utils::decoder;

/// Seconds between the Unix epoch and the Apple epoch (2001-01-01).
const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

const BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// A single row from the message table. Owned by the store; never written
/// back.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    /// Phone/email handle of the sender; `None` for messages sent by this
    /// account.
    pub sender: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
}

#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub display_name: String,
    pub identifier: String,
}

/// Read side of the message store, seam for the monitor loop.
pub trait MessageStore: Send + Sync {
    /// ROWID of the newest message in the chat, if any.
    fn latest_message_id(&self, chat_id: i64) -> Result<Option<i64>, StoreError>;

    /// Messages with id strictly greater than `after_id`, ascending by id.
    fn messages_since(&self, chat_id: i64, after_id: i64) -> Result<Vec<Message>, StoreError>;

    /// The most recent `limit` messages with id strictly less than
    /// `before_id`, returned oldest-first.
    fn recent_messages_before(
        &self,
        chat_id: i64,
        before_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;
}

pub struct MessagesDb {
    db_path: String,
}

impl MessagesDb {
    /// Open the store, probing that a read-only connection can be made.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let db = Self {
            db_path: db_path.to_string(),
        };
        db.connect()?;
        Ok(db)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            format!("file:{}?mode=ro", self.db_path),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Recent chats, newest ROWID first, for the picker.
    pub fn fetch_chats(&self, limit: usize) -> Result<Vec<ChatSummary>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT chat.ROWID, chat.display_name, chat.chat_identifier
             FROM chat
             ORDER BY chat.ROWID DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(ChatSummary {
                chat_id: row.get(0)?,
                display_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                identifier: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// The name/identifier used to address a chat when sending.
    pub fn chat_name(&self, chat_id: i64) -> Result<String, StoreError> {
        let conn = self.connect()?;
        let (display_name, identifier): (Option<String>, Option<String>) = conn.query_row(
            "SELECT display_name, chat_identifier FROM chat WHERE ROWID = ?1",
            [chat_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let display_name = display_name.unwrap_or_default().trim().to_string();
        if !display_name.is_empty() {
            return Ok(display_name);
        }
        Ok(identifier.unwrap_or_default().trim().to_string())
    }

    fn query_messages(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        chat_id: i64,
    ) -> Result<Vec<Message>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            let text: Option<String> = row.get(1)?;
            let blob: Option<Vec<u8>> = row.get(2)?;
            Ok(Message {
                id: row.get(0)?,
                chat_id,
                sender: row.get(5)?,
                text: decoder::extract_text(text.as_deref(), blob.as_deref()),
                timestamp: apple_timestamp(row.get::<_, Option<i64>>(4)?.unwrap_or(0)),
                is_from_me: row.get::<_, i64>(3)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }
}

impl MessageStore for MessagesDb {
    fn latest_message_id(&self, chat_id: i64) -> Result<Option<i64>, StoreError> {
        let conn = self.connect()?;
        let max_id: Option<i64> = conn.query_row(
            "SELECT MAX(message.ROWID)
             FROM message
             JOIN chat_message_join cmj ON cmj.message_id = message.ROWID
             WHERE cmj.chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(max_id)
    }

    fn messages_since(&self, chat_id: i64, after_id: i64) -> Result<Vec<Message>, StoreError> {
        self.query_messages(
            "SELECT message.ROWID, message.text, message.attributedBody,
                    message.is_from_me, message.date, handle.id
             FROM message
             JOIN chat_message_join cmj ON cmj.message_id = message.ROWID
             LEFT JOIN handle ON handle.ROWID = message.handle_id
             WHERE cmj.chat_id = ?1 AND message.ROWID > ?2
             ORDER BY message.ROWID ASC",
            &[&chat_id, &after_id],
            chat_id,
        )
    }

    fn recent_messages_before(
        &self,
        chat_id: i64,
        before_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let mut messages = self.query_messages(
            "SELECT message.ROWID, message.text, message.attributedBody,
                    message.is_from_me, message.date, handle.id
             FROM message
             JOIN chat_message_join cmj ON cmj.message_id = message.ROWID
             LEFT JOIN handle ON handle.ROWID = message.handle_id
             WHERE cmj.chat_id = ?1 AND message.ROWID < ?2
             ORDER BY message.ROWID DESC
             LIMIT ?3",
            &[&chat_id, &before_id, &(limit as i64)],
            chat_id,
        )?;
        messages.reverse();
        Ok(messages)
    }
}

/// Convert a raw `message.date` value to UTC. Modern macOS stores
/// nanoseconds since the Apple epoch; very old databases stored seconds.
fn apple_timestamp(raw: i64) -> DateTime<Utc> {
    let secs = if raw.abs() > 100_000_000_000 {
        raw / 1_000_000_000
    } else {
        raw
    };
    Utc.timestamp_opt(secs + APPLE_EPOCH_OFFSET_SECS, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
