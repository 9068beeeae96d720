// store/mod.rs — File-backed Task Store.
//
// Owns `{data_dir}/tasks.json`: a single pretty-printed JSON array holding
// every task. Every mutation is a full read-modify-write of that file,
// serialized through an internal mutex so concurrent requests cannot
// overwrite each other's changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Keys owned by the server. Stripped from incoming payloads so clients
/// cannot pick their own id or forge timestamps.
const RESERVED_KEYS: &[&str] = &["id", "createdAt", "updatedAt"];

const TASKS_FILE: &str = "tasks.json";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File unreadable or unwritable for reasons other than non-existence
    /// (permissions, disk full). Missing file is the bootstrap case, not
    /// an error.
    #[error("task file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Existing file content that does not decode as a task array, or a
    /// collection that fails to serialize.
    #[error("task file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ─── Task model ──────────────────────────────────────────────────────────────

/// A stored task: server-assigned id and timestamps plus whatever payload
/// the client supplied at create/update time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Caller-defined fields (title, status, priority, ...). Opaque to the
    /// store beyond being a JSON object.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// An incoming task payload. Any JSON object decodes; no schema is
/// enforced beyond that.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDraft {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TaskDraft {
    /// Drop server-owned keys from the payload.
    fn into_fields(mut self) -> Map<String, Value> {
        for key in RESERVED_KEYS {
            self.fields.remove(*key);
        }
        self.fields
    }
}

// ─── TaskStore ───────────────────────────────────────────────────────────────

pub struct TaskStore {
    file_path: PathBuf,
    /// Serializes the read-modify-write cycle of every mutating operation;
    /// an unguarded second writer's save would win at file granularity.
    write_lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file_path: data_dir.join(TASKS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// The full current collection, in insertion order. A missing file is
    /// a fresh install and yields an empty collection.
    pub async fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.load().await
    }

    /// Create a task. Any id or timestamps in the payload are ignored; the
    /// store assigns a fresh UUID and stamps both timestamps with the same
    /// instant. Returns the populated task so the caller can echo it back.
    pub async fn add(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut tasks = self.load().await?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            fields: draft.into_fields(),
        };
        tasks.push(task.clone());
        self.save(&tasks).await?;

        debug!(id = %task.id, total = tasks.len(), "task added");
        Ok(task)
    }

    /// Replace the payload of the task with the given id. The id comes
    /// from the caller's path parameter, never from the body. The stored
    /// `createdAt` is preserved; only `updatedAt` is refreshed.
    ///
    /// An unknown id is a silent no-op: the collection is written back
    /// unchanged and the call succeeds with the echoed payload. See
    /// DESIGN.md on the not-found contract.
    pub async fn update(&self, id: &str, draft: TaskDraft) -> Result<Task, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut tasks = self.load().await?;
        let now = Utc::now();
        let fields = draft.into_fields();

        let task = match tasks.iter_mut().find(|t| t.id == id) {
            Some(existing) => {
                existing.fields = fields;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                debug!(id, "ignoring update for unknown task id");
                Task {
                    id: id.to_string(),
                    created_at: now,
                    updated_at: now,
                    fields,
                }
            }
        };
        self.save(&tasks).await?;
        Ok(task)
    }

    /// Remove the first task with the given id, shifting later entries
    /// left. An unknown id is a silent no-op.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut tasks = self.load().await?;
        if let Some(pos) = tasks.iter().position(|t| t.id == id) {
            tasks.remove(pos);
            debug!(id, total = tasks.len(), "task deleted");
        } else {
            debug!(id, "ignoring delete for unknown task id");
        }
        self.save(&tasks).await
    }

    async fn load(&self) -> Result<Vec<Task>, StoreError> {
        let data = match fs::read_to_string(&self.file_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.file_path.clone(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&data).map_err(|e| StoreError::Json {
            path: self.file_path.clone(),
            source: e,
        })
    }

    /// Rewrite the whole file. Atomic: write to a tmp file, then rename
    /// over the real one so readers never see a partial array.
    async fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(tasks).map_err(|e| StoreError::Json {
            path: self.file_path.clone(),
            source: e,
        })?;

        let tmp_path = self.file_path.with_extension("json.tmp");
        let io_err = |e| StoreError::Io {
            path: self.file_path.clone(),
            source: e,
        };
        fs::write(&tmp_path, json).await.map_err(io_err)?;
        fs::rename(&tmp_path, &self.file_path).await.map_err(io_err)?;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn draft(title: &str) -> TaskDraft {
        serde_json::from_value(json!({ "title": title, "status": "todo" })).unwrap()
    }

    #[tokio::test]
    async fn test_list_on_fresh_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        assert!(store.list().await.unwrap().is_empty());
        // Listing alone must not create the file.
        assert!(!dir.path().join(TASKS_FILE).exists());
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let task = store.add(draft("write docs")).await.unwrap();
        assert!(!task.id.is_empty());
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.fields["title"], json!("write docs"));

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![task]);
    }

    #[tokio::test]
    async fn test_add_ignores_client_supplied_id_and_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let incoming: TaskDraft = serde_json::from_value(json!({
            "id": "chosen-by-client",
            "createdAt": "1999-01-01T00:00:00Z",
            "updatedAt": "1999-01-01T00:00:00Z",
            "title": "sneaky"
        }))
        .unwrap();
        let task = store.add(incoming).await.unwrap();

        assert_ne!(task.id, "chosen-by-client");
        assert!(task.created_at > DateTime::parse_from_rfc3339("2000-01-01T00:00:00Z").unwrap());
        assert!(!task.fields.contains_key("id"));
        assert!(!task.fields.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn test_identical_drafts_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let a = store.add(draft("same")).await.unwrap();
        let b = store.add(draft("same")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_preserves_created_at_and_bumps_updated_at() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let original = store.add(draft("before")).await.unwrap();
        let untouched = store.add(draft("bystander")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = store.update(&original.id, draft("after")).await.unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at > original.updated_at);
        assert_eq!(updated.fields["title"], json!("after"));

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![updated, untouched]);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_silent_noop() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let existing = store.add(draft("keep me")).await.unwrap();
        store.update("no-such-id", draft("ghost")).await.unwrap();

        let listed = store.list().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![existing.id.as_str()]);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let a = store.add(draft("a")).await.unwrap();
        let b = store.add(draft("b")).await.unwrap();
        let c = store.add(draft("c")).await.unwrap();

        store.delete(&b.id).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![a, c]);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_silent_noop() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let before = vec![store.add(draft("only")).await.unwrap()];
        store.delete("no-such-id").await.unwrap();
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_corrupt_file_surfaces_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(TASKS_FILE), "not json at all").unwrap();

        let store = TaskStore::new(dir.path());
        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_adds_lose_no_writes() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TaskStore::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add(draft(&format!("task {i}"))).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 16);
        let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn test_sequence_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let a = store.add(draft("a")).await.unwrap();
        let b = store.add(draft("b")).await.unwrap();
        let b2 = store.update(&b.id, draft("b2")).await.unwrap();
        store.delete(&a.id).await.unwrap();
        let c = store.add(draft("c")).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![b2, c]);
    }
}
