//! Saved-session persistence
//!
//! One JSON file holds the whole collection. Every mutation is a wholesale
//! read-modify-write, last write wins. No migrations, no versioning, no
//! in-app delete.

use std::path::PathBuf;

use chrono::Utc;

use crate::models::{SavedSession, TimedEvent};

type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// File-backed store for the saved-session collection.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the whole collection. A missing file is an empty collection.
    pub async fn load_all(&self) -> Result<Vec<SavedSession>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Find one session by its opaque id.
    pub async fn find(&self, id: &str) -> Result<Option<SavedSession>, StoreError> {
        let sessions = self.load_all().await?;
        Ok(sessions.into_iter().find(|session| session.id == id))
    }

    /// Append a new session and write the collection back. The id is
    /// time-derived; events keep their original order.
    pub async fn save(
        &self,
        name: &str,
        media_reference: &str,
        thumbnail_reference: &str,
        timestamps: Vec<TimedEvent>,
    ) -> Result<SavedSession, StoreError> {
        let session = SavedSession {
            id: Utc::now().timestamp_millis().to_string(),
            name: name.to_string(),
            media_reference: media_reference.to_string(),
            thumbnail_reference: thumbnail_reference.to_string(),
            timestamps,
        };

        let mut sessions = self.load_all().await?;
        sessions.push(session.clone());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&sessions)?;
        tokio::fs::write(&self.path, json).await?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_events() -> Vec<TimedEvent> {
        vec![
            TimedEvent {
                timestamp: "00:05".to_string(),
                description: "person enters".to_string(),
                is_dangerous: false,
            },
            TimedEvent {
                timestamp: "00:12".to_string(),
                description: "sudden movement near the shelf".to_string(),
                is_dangerous: true,
            },
        ]
    }

    #[tokio::test]
    async fn save_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("saved_sessions.json"));

        let saved = store
            .save(
                "clip1",
                "/media/clip1.mp4",
                "/thumbs/clip1.jpg",
                two_events(),
            )
            .await
            .unwrap();
        assert!(!saved.id.is_empty());

        let sessions = store.load_all().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "clip1");
        assert_eq!(sessions[0].id, saved.id);
        assert_eq!(sessions[0].timestamps, two_events());
    }

    #[tokio::test]
    async fn missing_file_is_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nope.json"));
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.find("42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_saves_append_to_the_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("saved_sessions.json"));

        let first = store.save("a", "/m/a.mp4", "", Vec::new()).await.unwrap();
        store.save("b", "/m/b.mp4", "", two_events()).await.unwrap();

        let sessions = store.load_all().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].name, "a");
        assert_eq!(sessions[1].name, "b");

        let found = store.find(&first.id).await.unwrap().unwrap();
        assert_eq!(found.name, "a");
    }
}
