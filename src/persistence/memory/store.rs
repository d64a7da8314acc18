use async_trait::async_trait;

use super::MemoryPersistence;
use crate::common::error::{MarketError, Result};
use crate::common::model::Task;
use crate::persistence::model::{TaskChange, TaskFilter};
use crate::persistence::traits::{TaskOp, TaskStore};

#[async_trait]
impl TaskStore for MemoryPersistence {
    async fn save(&self, task: &Task) -> Result<()> {
        self.upsert(&self.tasks, &task.id, task.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.get(id).map(|slot| slot.value.clone()))
    }

    async fn load_batch(&self, ids: &[String]) -> Result<Vec<Option<Task>>> {
        // 内存操作极快，直接循环获取即可
        Ok(ids
            .iter()
            .map(|id| self.tasks.get(id).map(|slot| slot.value.clone()))
            .collect())
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        Ok(Self::ordered(&self.tasks, |task| filter.matches(task)))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let existed = self.tasks.remove(id).is_some();
        if existed {
            self.logs.remove(id);
        }
        Ok(existed)
    }

    /// [核心] 原子修改
    /// get_mut 持有分片写锁直到函数返回，期间同一分片的其他写者都会排队
    async fn modify(&self, id: &str, op: TaskOp<'_>) -> Result<TaskChange> {
        let mut slot = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| MarketError::TaskNotFound(id.to_string()))?;

        let before = slot.value.clone();
        let mut after = before.clone();
        op(&mut after)?;
        after.epoch = before.epoch + 1;
        after.touch();

        slot.value = after.clone();
        Ok(TaskChange { before, after })
    }
}
