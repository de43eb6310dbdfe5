use crate::types::{TaskRecord, TaskSet};
use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Whole-snapshot persistence for task records.
///
/// Not an append log: every write replaces the entire set. [`put`] is the
/// load-modify-save cycle and must run as a critical section; implementations
/// serialize it internally. Separate processes sharing one snapshot are not
/// coordinated and the last writer wins.
///
/// [`put`]: TaskStore::put
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Load every persisted record. A store that was never written is empty.
    async fn load_all(&self) -> ConductorResult<TaskSet>;

    /// Replace the persisted set with `tasks`.
    async fn save_all(&self, tasks: &TaskSet) -> ConductorResult<()>;

    /// Insert or replace a single record.
    async fn put(&self, record: &TaskRecord) -> ConductorResult<()>;

    /// Look up a single record.
    async fn get(&self, task_id: &str) -> ConductorResult<Option<TaskRecord>> {
        Ok(self.load_all().await?.remove(task_id))
    }
}

/// Task store backed by one pretty-printed JSON file.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the
/// snapshot, so an interrupted save leaves the previous snapshot intact.
pub struct JsonTaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    async fn read_snapshot(&self) -> ConductorResult<TaskSet> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TaskSet::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(TaskSet::new());
        }
        serde_json::from_str(&data).map_err(|e| {
            ConductorError::Store(format!(
                "Failed to parse task snapshot {}: {e}",
                self.path.display()
            ))
        })
    }

    async fn write_snapshot(&self, tasks: &TaskSet) -> ConductorResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut json = serde_json::to_string_pretty(tasks)?;
        json.push('\n');

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), tasks = tasks.len(), "Task snapshot written");
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn load_all(&self) -> ConductorResult<TaskSet> {
        self.read_snapshot().await
    }

    async fn save_all(&self, tasks: &TaskSet) -> ConductorResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot(tasks).await
    }

    async fn put(&self, record: &TaskRecord) -> ConductorResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.read_snapshot().await?;
        tasks.insert(record.task_id.clone(), record.clone());
        self.write_snapshot(&tasks).await
    }
}

/// In-memory task store for tests and embedding.
pub struct InMemoryTaskStore {
    tasks: RwLock<TaskSet>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(TaskSet::new()),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn load_all(&self) -> ConductorResult<TaskSet> {
        Ok(self.tasks.read().await.clone())
    }

    async fn save_all(&self, tasks: &TaskSet) -> ConductorResult<()> {
        *self.tasks.write().await = tasks.clone();
        Ok(())
    }

    async fn put(&self, record: &TaskRecord) -> ConductorResult<()> {
        self.tasks
            .write()
            .await
            .insert(record.task_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, task_id: &str) -> ConductorResult<Option<TaskRecord>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }
}
