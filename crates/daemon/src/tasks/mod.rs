pub mod executor;

use engine::{Task, TaskId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::error::{CoreError, CoreResult};

pub use executor::{AdvanceOutcome, PlanExecutor, StepAction};

/// Shared handle to one task. Holding the lock serializes every cursor move
/// for that task; different tasks never contend on it.
pub type TaskHandle = Arc<Mutex<Task>>;

/// Registry of active task plans. Ids start at 1, only grow, and are never
/// reused, even after a task is removed.
pub struct TaskStore {
    next_id: AtomicU64,
    tasks: RwLock<HashMap<TaskId, TaskHandle>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore {
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, steps: Vec<String>) -> TaskId {
        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let step_count = steps.len();
        let task = Arc::new(Mutex::new(Task::new(task_id, steps)));
        self.tasks.write().await.insert(task_id, task);
        info!(task_id, steps = step_count, "task created");
        task_id
    }

    /// Snapshot of a task. Waits for any in-flight advance on it to finish.
    pub async fn get(&self, task_id: TaskId) -> CoreResult<Task> {
        let handle = self.handle(task_id).await?;
        let task = handle.lock().await;
        Ok(task.clone())
    }

    pub async fn handle(&self, task_id: TaskId) -> CoreResult<TaskHandle> {
        self.tasks
            .read()
            .await
            .get(&task_id)
            .cloned()
            .ok_or(CoreError::UnknownTask(task_id))
    }

    /// Drop a task from the registry and return its final state.
    pub async fn remove(&self, task_id: TaskId) -> CoreResult<Task> {
        let handle = self
            .tasks
            .write()
            .await
            .remove(&task_id)
            .ok_or(CoreError::UnknownTask(task_id))?;
        let task = handle.lock().await.clone();
        info!(task_id, completed = task.is_completed(), "task removed");
        Ok(task)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use engine::TaskPhase;

    #[tokio::test]
    async fn ids_are_monotonic_and_never_reused() {
        let store = TaskStore::new();
        let a = store.create(vec!["one".into()]).await;
        let b = store.create(vec!["two".into()]).await;
        assert_eq!((a, b), (1, 2));

        store.remove(b).await.unwrap();
        let c = store.create(Vec::new()).await;
        assert_eq!(c, 3);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn new_tasks_are_not_started() {
        let store = TaskStore::new();
        let id = store.create(vec!["cut".into(), "move".into()]).await;
        let task = store.get(id).await.unwrap();
        assert_eq!(task.current_step_index(), -1);
        assert_eq!(task.phase(), TaskPhase::NotStarted);
        assert_eq!(task.steps, vec!["cut", "move"]);
    }

    #[tokio::test]
    async fn unknown_ids_fail() {
        let store = TaskStore::new();
        assert_matches!(store.get(42).await, Err(CoreError::UnknownTask(42)));
        assert_matches!(store.remove(42).await, Err(CoreError::UnknownTask(42)));

        let id = store.create(Vec::new()).await;
        store.remove(id).await.unwrap();
        assert_matches!(store.get(id).await, Err(CoreError::UnknownTask(_)));
        assert!(store.is_empty().await);
    }
}
