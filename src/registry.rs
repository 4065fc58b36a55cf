use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Message stored for a channel the first time it is onboarded. Operators
/// can change it afterwards; the wizard never overwrites it.
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome! Your request to join has been approved.";

/// Per-channel configuration store. A channel having a row here is what
/// makes the bot service its join requests at all.
#[derive(Clone)]
pub struct ChannelRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl ChannelRegistry {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Registry backed by an in-memory database. Used in tests; cloning the
    /// handle shares the same underlying store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                channel_id INTEGER PRIMARY KEY,
                welcome_message TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a channel with the default welcome message. A no-op when the
    /// channel already has a row: the existing message is never overridden.
    pub fn upsert_default(&self, channel_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO channels (channel_id, welcome_message) VALUES (?1, ?2)",
            params![channel_id, DEFAULT_WELCOME_MESSAGE],
        )?;
        Ok(())
    }

    /// The stored welcome message, or `None` when the channel was never
    /// onboarded.
    pub fn get_welcome_message(&self, channel_id: i64) -> Result<Option<String>> {
        let conn = self.lock()?;
        let message = conn
            .query_row(
                "SELECT welcome_message FROM channels WHERE channel_id = ?1",
                params![channel_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(message)
    }

    /// Replace the welcome message of an already-onboarded channel.
    pub fn set_welcome_message(&self, channel_id: i64, text: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE channels SET welcome_message = ?2 WHERE channel_id = ?1",
            params![channel_id, text],
        )?;
        if changed == 0 {
            anyhow::bail!("channel {} is not registered", channel_id);
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("lock poisoned: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_of_unregistered_channel_is_none() {
        let registry = ChannelRegistry::open_in_memory().unwrap();
        assert_eq!(registry.get_welcome_message(100).unwrap(), None);
    }

    #[test]
    fn upsert_stores_default_message() {
        let registry = ChannelRegistry::open_in_memory().unwrap();
        registry.upsert_default(200).unwrap();
        assert_eq!(
            registry.get_welcome_message(200).unwrap().as_deref(),
            Some(DEFAULT_WELCOME_MESSAGE)
        );
    }

    #[test]
    fn upsert_is_idempotent_and_never_overrides() {
        let registry = ChannelRegistry::open_in_memory().unwrap();
        registry.upsert_default(300).unwrap();
        registry.set_welcome_message(300, "Hi there").unwrap();

        // A later onboarding of the same channel must not reset the message.
        registry.upsert_default(300).unwrap();
        assert_eq!(
            registry.get_welcome_message(300).unwrap().as_deref(),
            Some("Hi there")
        );
    }

    #[test]
    fn set_welcome_message_requires_registration() {
        let registry = ChannelRegistry::open_in_memory().unwrap();
        assert!(registry.set_welcome_message(400, "nope").is_err());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.sqlite");

        {
            let registry = ChannelRegistry::open(&path).unwrap();
            registry.upsert_default(500).unwrap();
        }

        let registry = ChannelRegistry::open(&path).unwrap();
        assert_eq!(
            registry.get_welcome_message(500).unwrap().as_deref(),
            Some(DEFAULT_WELCOME_MESSAGE)
        );
    }
}
