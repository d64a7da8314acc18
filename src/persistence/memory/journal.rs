use async_trait::async_trait;

use super::MemoryPersistence;
use crate::common::error::Result;
use crate::common::model::{TaskFeedback, TaskLog};
use crate::persistence::traits::{FeedbackStore, LogSink};

#[async_trait]
impl LogSink for MemoryPersistence {
    async fn append(&self, entry: &TaskLog) -> Result<()> {
        self.logs
            .entry(entry.task_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn history(&self, task_id: &str) -> Result<Vec<TaskLog>> {
        Ok(self
            .logs
            .get(task_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl FeedbackStore for MemoryPersistence {
    async fn save_feedback(&self, feedback: &TaskFeedback) -> Result<()> {
        self.feedback.write().await.push(feedback.clone());
        Ok(())
    }

    async fn feedback_for_task(&self, task_id: &str) -> Result<Vec<TaskFeedback>> {
        let all = self.feedback.read().await;
        Ok(all.iter().filter(|f| f.task_id == task_id).cloned().collect())
    }

    async fn feedback_for_worker(&self, worker_id: &str) -> Result<Vec<TaskFeedback>> {
        let all = self.feedback.read().await;
        Ok(all
            .iter()
            .filter(|f| f.worker_id == worker_id)
            .cloned()
            .collect())
    }
}
