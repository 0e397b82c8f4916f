//! services/bot/src/adapters/json_file.rs
//!
//! This module contains the snapshot adapter, the concrete implementation of the
//! `PersistenceService` port. The whole store is kept in one JSON document that
//! is replaced atomically on every save.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use todo_reminder_core::domain::{ChatId, GlobalStore, Reminder, UserState};
use todo_reminder_core::ports::{PersistenceService, PortError, PortResult};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A persistence adapter that stores the snapshot in a single JSON file.
#[derive(Clone, Debug)]
pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    /// Creates a new `JsonFileAdapter`. The file is not touched until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

//=========================================================================================
// "Impure" Serialized Record Structs
//=========================================================================================

/// On-disk layout: `{"<chat id>": {"todos": [...], "reminders": [...]}}`.
type StoreRecord = BTreeMap<i64, UserDataRecord>;

#[derive(Serialize, Deserialize)]
struct UserDataRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    todos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    reminders: Vec<ReminderRecord>,
}

impl UserDataRecord {
    fn from_domain(user: &UserState) -> Self {
        Self {
            todos: user.todos.clone(),
            reminders: user.reminders.iter().map(ReminderRecord::from_domain).collect(),
        }
    }

    fn to_domain(self) -> UserState {
        UserState {
            todos: self.todos,
            reminders: self.reminders.into_iter().map(|r| r.to_domain()).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ReminderRecord {
    // Older snapshots carry no id; give those reminders a fresh one.
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    content: String,
    time: DateTime<Utc>,
}

impl ReminderRecord {
    fn from_domain(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id,
            content: reminder.content.clone(),
            time: reminder.fire_at,
        }
    }

    fn to_domain(self) -> Reminder {
        Reminder {
            id: self.id,
            content: self.content,
            fire_at: self.time,
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn decode(bytes: &[u8]) -> PortResult<GlobalStore> {
    let record: StoreRecord =
        serde_json::from_slice(bytes).map_err(|e| PortError::Parse(e.to_string()))?;
    Ok(record
        .into_iter()
        .map(|(chat_id, user)| (ChatId(chat_id), user.to_domain()))
        .collect())
}

fn encode(store: &GlobalStore) -> PortResult<Vec<u8>> {
    let record: StoreRecord = store
        .iter()
        .map(|(chat_id, user)| (chat_id.0, UserDataRecord::from_domain(user)))
        .collect();
    serde_json::to_vec_pretty(&record).map_err(|e| PortError::Unexpected(e.to_string()))
}

/// Writes `content` to `path` through a temp file in the same directory and a rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

//=========================================================================================
// `PersistenceService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PersistenceService for JsonFileAdapter {
    async fn load(&self) -> PortResult<GlobalStore> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PortError::NotFound(self.path.display().to_string()),
            _ => PortError::Io(e.to_string()),
        })?;
        decode(&bytes)
    }

    async fn save(&self, store: &GlobalStore) -> PortResult<()> {
        let content = encode(store)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .map_err(|e| PortError::Io(e.to_string()))?;
        debug!("Saved {} chats to {}", store.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn sample_store() -> GlobalStore {
        let mut store = GlobalStore::new();
        let first = store.entry(ChatId(1001)).or_default();
        first.add_todo("buy milk");
        first.add_todo("call the bank");
        first.add_reminder(Reminder::new("stretch", Utc::now() + TimeDelta::minutes(10)));
        first.add_reminder(Reminder::new("sleep", Utc::now() + TimeDelta::hours(8)));
        let second = store.entry(ChatId(-42)).or_default();
        second.add_reminder(Reminder::new("group standup", Utc::now() - TimeDelta::days(1)));
        store.insert(ChatId(7), UserState::default());
        store
    }

    #[tokio::test]
    async fn save_then_load_reconstructs_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path().join("userdata.json"));
        let store = sample_store();

        adapter.save(&store).await.unwrap();
        let loaded = adapter.load().await.unwrap();
        assert_eq!(loaded, store);
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path().join("userdata.json"));

        adapter.save(&sample_store()).await.unwrap();
        let mut smaller = GlobalStore::new();
        smaller.entry(ChatId(1)).or_default().add_todo("only this");
        adapter.save(&smaller).await.unwrap();

        assert_eq!(adapter.load().await.unwrap(), smaller);
        // Only the snapshot itself remains; temp files were renamed away.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path().join("absent.json"));
        assert!(matches!(adapter.load().await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userdata.json");
        std::fs::write(&path, "{ not json").unwrap();
        let adapter = JsonFileAdapter::new(path);
        assert!(matches!(adapter.load().await, Err(PortError::Parse(_))));
    }

    #[tokio::test]
    async fn save_into_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path().join("nope").join("userdata.json"));
        assert!(matches!(
            adapter.save(&GlobalStore::new()).await,
            Err(PortError::Io(_))
        ));
    }

    #[test]
    fn legacy_snapshot_without_ids_loads() {
        let json = r#"{
            "123": {
                "todos": ["feed cat"],
                "reminders": [
                    {"content": "pay rent", "time": "2024-05-01T09:30:00.123456789+03:00"}
                ]
            },
            "-5": {"todos": null, "reminders": null},
            "9": {}
        }"#;
        let store = decode(json.as_bytes()).unwrap();

        let user = &store[&ChatId(123)];
        assert_eq!(user.todos, vec!["feed cat"]);
        assert_eq!(user.reminders[0].content, "pay rent");
        assert_eq!(
            user.reminders[0].fire_at,
            "2024-05-01T06:30:00.123456789Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(store[&ChatId(-5)], UserState::default());
        assert_eq!(store[&ChatId(9)], UserState::default());
    }

    #[test]
    fn encoded_layout_uses_chat_id_keys() {
        let mut store = GlobalStore::new();
        store.entry(ChatId(55)).or_default().add_todo("x");
        let value: serde_json::Value = serde_json::from_slice(&encode(&store).unwrap()).unwrap();
        assert_eq!(value["55"]["todos"][0], "x");
        assert!(value["55"]["reminders"].as_array().unwrap().is_empty());
    }
}
