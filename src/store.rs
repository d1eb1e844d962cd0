// In-memory task list shared by the API handlers
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::model::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTask {
    pub id: String,
    #[serde(flatten)]
    pub task: Task,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<StoredTask>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store generated tasks, assigning ids. Returns the stored copies.
    pub fn add(&mut self, tasks: Vec<Task>) -> Vec<StoredTask> {
        let now = Utc::now();
        let stored: Vec<StoredTask> = tasks
            .into_iter()
            .map(|task| StoredTask {
                id: uuid::Uuid::new_v4().to_string(),
                task,
                created_at: now,
            })
            .collect();
        self.tasks.extend(stored.iter().cloned());
        stored
    }

    pub fn list(&self) -> &[StoredTask] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&StoredTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn update_status(&mut self, id: &str, status: TaskStatus) -> Result<StoredTask> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::NotFound(format!("task {}", id)))?;
        task.task.status = status;
        Ok(task.clone())
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Err(AppError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }
}
