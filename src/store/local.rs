//! Local default backend: a SQLite key-value table holding the whole feature
//! collection as one JSON array under [`FEATURES_KEY`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::schema;
use crate::models::Feature;

/// Key the serialized feature collection is stored under.
pub const FEATURES_KEY: &str = "Genux-Features";

#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    /// Read the stored collection. Absent or unparseable data reads as empty.
    pub fn read_features(&self) -> Result<Vec<Feature>> {
        let Some(raw) = self.get(FEATURES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(features) => Ok(features),
            Err(e) => {
                tracing::warn!("Stored features are corrupt, starting empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub fn write_features(&self, features: &[Feature]) -> Result<()> {
        let raw = serde_json::to_string(features)?;
        self.set(FEATURES_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactType, FeatureId};

    fn feature(id: i64) -> Feature {
        Feature {
            id: FeatureId(id),
            prompt: format!("feature {}", id),
            artifact_type: ArtifactType::Stylesheet,
            code: "body { margin: 0; }".to_string(),
        }
    }

    #[test]
    fn absent_key_reads_empty() {
        let store = LocalStore::open_memory().unwrap();
        assert!(store.read_features().unwrap().is_empty());
    }

    #[test]
    fn corrupt_blob_reads_empty() {
        let store = LocalStore::open_memory().unwrap();
        store.set(FEATURES_KEY, "{not json").unwrap();
        assert!(store.read_features().unwrap().is_empty());
    }

    #[test]
    fn writes_one_array_under_fixed_key() {
        let store = LocalStore::open_memory().unwrap();
        store.write_features(&[feature(1), feature(2)]).unwrap();

        let raw = store.get(FEATURES_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["type"], "stylesheet");

        store.write_features(&[feature(3)]).unwrap();
        assert_eq!(store.read_features().unwrap(), vec![feature(3)]);
    }

    #[test]
    fn reads_records_written_with_legacy_labels() {
        let store = LocalStore::open_memory().unwrap();
        store
            .set(
                FEATURES_KEY,
                r#"[{"id": 1700000000000, "prompt": "hide ads", "code": ".ad{display:none}", "type": "css"}]"#,
            )
            .unwrap();
        let features = store.read_features().unwrap();
        assert_eq!(features[0].artifact_type, ArtifactType::Stylesheet);
        assert_eq!(features[0].id, FeatureId(1_700_000_000_000));
    }
}
