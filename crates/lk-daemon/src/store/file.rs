//! JSON file stores
//!
//! Each record is a single `<user>.json` file. Writes go to a temporary
//! sibling first and are renamed into place, so a crash never leaves a
//! half-written record behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use lk_core::error::StoreError;
use lk_core::session::{ActorState, Session, SessionUpdate};
use lk_core::traits::{SessionStore, StateStore};
use lk_core::types::UserId;

const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "json.tmp";

/// A directory of JSON records keyed by user
#[derive(Debug)]
struct JsonDir {
    root: PathBuf,
}

impl JsonDir {
    async fn open(root: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, user_id: &UserId) -> PathBuf {
        self.root
            .join(user_id.file_stem())
            .with_extension(RECORD_EXT)
    }

    async fn read<T: DeserializeOwned>(&self, user_id: &UserId) -> Result<Option<T>, StoreError> {
        read_record(&self.path_for(user_id)).await
    }

    async fn write<T: Serialize>(&self, user_id: &UserId, record: &T) -> Result<(), StoreError> {
        let path = self.path_for(user_id);
        let temp = path.with_extension(TEMP_EXT);
        let content = serde_json::to_vec_pretty(record)?;

        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    /// Remove a record, returning whether it existed
    async fn remove(&self, user_id: &UserId) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.path_for(user_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match read_record(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(StoreError::Serialization(e)) => {
                    tracing::warn!("Skipping unreadable record {}: {}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(records)
    }
}

async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Session records stored under `<state_dir>/sessions`
#[derive(Debug)]
pub struct FileSessionStore {
    dir: JsonDir,
    // Serializes read-modify-write sequences across users
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open (creating if needed) the session directory under `state_dir`
    pub async fn open(state_dir: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            dir: JsonDir::open(state_dir.join("sessions")).await?,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if self.dir.read::<Session>(&session.user_id).await?.is_some() {
            return Err(StoreError::AlreadyExists(session.user_id));
        }
        self.dir.write(&session.user_id, &session).await
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        self.dir.read(user_id).await
    }

    async fn update(
        &self,
        user_id: &UserId,
        update: &SessionUpdate,
        now_millis: u64,
    ) -> Result<Session, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut session: Session = self
            .dir
            .read(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(user_id.clone()))?;

        session.apply(update, now_millis);
        self.dir.write(user_id, &session).await?;
        Ok(session)
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.dir.remove(user_id).await
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self.dir.list().await?;
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(sessions)
    }
}

/// Actor states stored under `<state_dir>/actors`.
///
/// Each user's state is only ever written by that user's actor, so no
/// locking is needed here.
#[derive(Debug)]
pub struct FileStateStore {
    dir: JsonDir,
}

impl FileStateStore {
    /// Open (creating if needed) the actor directory under `state_dir`
    pub async fn open(state_dir: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            dir: JsonDir::open(state_dir.join("actors")).await?,
        })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<ActorState>, StoreError> {
        self.dir.read(user_id).await
    }

    async fn save(&self, state: &ActorState) -> Result<(), StoreError> {
        self.dir.write(&state.user_id, state).await
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.dir.remove(user_id).await.map(|_| ())
    }

    async fn list(&self) -> Result<Vec<ActorState>, StoreError> {
        self.dir.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lk_core::session::NewSession;
    use lk_core::types::ResourceId;

    fn session(user: &str) -> Session {
        Session::from_new(
            NewSession {
                user_id: UserId::new(user),
                primary_resource_id: ResourceId::new("vm-1"),
                secondary_resource_ids: vec![ResourceId::new("vm-2")],
                duration_minutes: 15,
            },
            1_000,
        )
    }

    fn state(user: &str) -> ActorState {
        ActorState {
            user_id: UserId::new(user),
            primary_resource_id: ResourceId::new("vm-1"),
            secondary_resource_ids: vec![],
            duration_minutes: 15,
            created_at: 1_000,
            alarm_at: Some(901_000),
            attempts: 0,
            last_error: None,
            exhausted: false,
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSessionStore::open(dir.path()).await.unwrap();
            store.insert(session("alice")).await.unwrap();
        }

        let store = FileSessionStore::open(dir.path()).await.unwrap();
        let loaded = store.get(&UserId::new("alice")).await.unwrap();
        assert_eq!(loaded, Some(session("alice")));
    }

    #[tokio::test]
    async fn test_insert_duplicate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        store.insert(session("alice")).await.unwrap();

        let err = store.insert(session("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        store.insert(session("alice")).await.unwrap();

        let updated = store
            .update(
                &UserId::new("alice"),
                &SessionUpdate {
                    duration_minutes: Some(45),
                },
                2_000,
            )
            .await
            .unwrap();
        assert_eq!(updated.duration_minutes, 45);
        assert_eq!(updated.updated_at, 2_000);

        assert!(store.delete(&UserId::new("alice")).await.unwrap());
        assert!(!store.delete(&UserId::new("alice")).await.unwrap());
        assert!(store.get(&UserId::new("alice")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_ids_with_path_characters() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        store.insert(session("../etc/passwd")).await.unwrap();
        store.insert(session("a/b")).await.unwrap();

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(dir.path().join("sessions").join("a%2Fb.json").exists());
    }

    #[tokio::test]
    async fn test_empty_user_id_stays_inside_store_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        store.insert(session("")).await.unwrap();

        assert!(dir.path().join("sessions").join("%.json").exists());
        assert!(!dir.path().join("sessions.json").exists());

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user_id, UserId::new(""));
        assert!(store.delete(&UserId::new("")).await.unwrap());
    }

    #[tokio::test]
    async fn test_state_list_skips_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).await.unwrap();
        store.save(&state("alice")).await.unwrap();
        tokio::fs::write(dir.path().join("actors").join("broken.json"), b"{not json")
            .await
            .unwrap();

        let states = store.list().await.unwrap();
        assert_eq!(states, vec![state("alice")]);
    }

    #[tokio::test]
    async fn test_state_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).await.unwrap();
        store.save(&state("alice")).await.unwrap();

        store.clear(&UserId::new("alice")).await.unwrap();
        store.clear(&UserId::new("alice")).await.unwrap();
        assert!(store.load(&UserId::new("alice")).await.unwrap().is_none());
    }
}
