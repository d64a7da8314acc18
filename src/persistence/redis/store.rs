use async_trait::async_trait;
use deadpool_redis::Connection;
use deadpool_redis::redis::{self, AsyncCommands};

use super::core::RedisPersistence;
use crate::common::error::{MarketError, Result};
use crate::common::model::{Availability, Skill, Task, TaskFeedback, TaskLog, Worker};
use crate::persistence::model::{TaskChange, TaskFilter, WorkerChange};
use crate::persistence::traits::{
    FeedbackStore, LogSink, SkillStore, TaskOp, TaskStore, WorkerOp, WorkerStore,
};

// ==========================================
// 任务
// ==========================================

#[async_trait]
impl TaskStore for RedisPersistence {
    async fn save(&self, task: &Task) -> Result<()> {
        self.put_ordered(&self.key_task(&task.id), &self.key_tasks(), &task.id, task)
            .await
    }

    async fn load(&self, id: &str) -> Result<Option<Task>> {
        self.get_json(&self.key_task(id)).await
    }

    async fn load_batch(&self, ids: &[String]) -> Result<Vec<Option<Task>>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.pool.get().await?;

        // 构造 MGET 批量查询
        let keys: Vec<String> = ids.iter().map(|id| self.key_task(id)).collect();
        let json_list: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut results = Vec::with_capacity(ids.len());
        for json_opt in json_list {
            match json_opt {
                Some(s) => results.push(Some(serde_json::from_str(&s)?)),
                None => results.push(None),
            }
        }
        Ok(results)
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let all: Vec<Task> = self
            .list_ordered(&self.key_tasks(), |id| self.key_task(id))
            .await?;
        Ok(all.into_iter().filter(|t| filter.matches(t)).collect())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();

        // 彻底清理：数据、历史、顺序索引
        pipe.atomic()
            .del(self.key_task(id))
            .del(self.key_logs(id))
            .ignore()
            .zrem(self.key_tasks(), id)
            .ignore();

        let (deleted,): (u32,) = pipe.query_async(&mut conn).await?;
        Ok(deleted > 0)
    }

    async fn modify(&self, id: &str, op: TaskOp<'_>) -> Result<TaskChange> {
        let (before, after) = self
            .compare_and_swap(&self.key_task(id), id, MarketError::TaskNotFound, |before: &Task| {
                let mut after = before.clone();
                op(&mut after)?;
                after.epoch = before.epoch + 1;
                after.touch();
                Ok(after)
            })
            .await?;
        Ok(TaskChange { before, after })
    }
}

// ==========================================
// Worker
// ==========================================

#[async_trait]
impl WorkerStore for RedisPersistence {
    async fn save_worker(&self, worker: &Worker) -> Result<()> {
        self.put_ordered(
            &self.key_worker(&worker.id),
            &self.key_workers(),
            &worker.id,
            worker,
        )
        .await
    }

    async fn load_worker(&self, id: &str) -> Result<Option<Worker>> {
        self.get_json(&self.key_worker(id)).await
    }

    async fn list_workers(&self, availability: Option<Availability>) -> Result<Vec<Worker>> {
        let all: Vec<Worker> = self
            .list_ordered(&self.key_workers(), |id| self.key_worker(id))
            .await?;
        Ok(all
            .into_iter()
            .filter(|w| availability.is_none_or(|a| w.availability == a))
            .collect())
    }

    async fn modify_worker(&self, id: &str, op: WorkerOp<'_>) -> Result<WorkerChange> {
        let (before, after) = self
            .compare_and_swap(
                &self.key_worker(id),
                id,
                MarketError::WorkerNotFound,
                |before: &Worker| {
                    let mut after = before.clone();
                    op(&mut after)?;
                    Ok(after)
                },
            )
            .await?;
        Ok(WorkerChange { before, after })
    }

    async fn remove_worker(&self, id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.key_worker(id))
            .zrem(self.key_workers(), id)
            .ignore();
        let (deleted,): (u32,) = pipe.query_async(&mut conn).await?;
        Ok(deleted > 0)
    }
}

// ==========================================
// 技能目录
// ==========================================

impl RedisPersistence {
    /// 一次 WATCH/EXEC 尝试；返回 `false` 表示被并发写者打断
    async fn try_save_skill(&self, conn: &mut Connection, skill: &Skill, json: &str) -> Result<bool> {
        let names_key = self.key_skill_names();
        let skill_key = self.key_skill(&skill.id);

        redis::cmd("WATCH")
            .arg(&names_key)
            .arg(&skill_key)
            .query_async::<()>(&mut *conn)
            .await?;

        let owner: Option<String> = conn.hget(&names_key, &skill.name).await?;
        if owner.as_deref().is_some_and(|o| o != skill.id) {
            return Err(MarketError::Conflict(format!(
                "skill name '{}' is already taken",
                skill.name
            )));
        }

        let previous: Option<String> = conn.get(&skill_key).await?;
        let old_name = match previous {
            Some(s) => Some(serde_json::from_str::<Skill>(&s)?.name),
            None => None,
        };
        let seq: u64 = conn.incr(self.key_seq(), 1).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        // 改名: 释放旧名称
        if let Some(old) = old_name.filter(|old| old != &skill.name) {
            pipe.hdel(&names_key, old).ignore();
        }
        pipe.hset(&names_key, &skill.name, &skill.id)
            .ignore()
            .set(&skill_key, json)
            .ignore()
            .cmd("ZADD")
            .arg(self.key_skills())
            .arg("NX")
            .arg(seq)
            .arg(&skill.id)
            .ignore();

        let committed: Option<()> = pipe.query_async(&mut *conn).await?;
        Ok(committed.is_some())
    }
}

#[async_trait]
impl SkillStore for RedisPersistence {
    /// 名称索引与技能主体放在同一个事务里写入，WATCH 名称索引防止并发抢注
    async fn save_skill(&self, skill: &Skill) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(skill)?;

        for attempt in 0..=self.cas_retries {
            match self.try_save_skill(&mut conn, skill, &json).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    tracing::debug!(skill_id = %skill.id, attempt, "Skill save conflict, retrying");
                }
                Err(e) => {
                    // 中途出错时连接会带着 WATCH 回到连接池
                    let _ = redis::cmd("UNWATCH").query_async::<()>(&mut conn).await;
                    return Err(e);
                }
            }
        }

        Err(MarketError::LockAcquireFailed(skill.id.clone()))
    }

    async fn load_skill(&self, id: &str) -> Result<Option<Skill>> {
        self.get_json(&self.key_skill(id)).await
    }

    async fn find_skill_by_name(&self, name: &str) -> Result<Option<Skill>> {
        let id: Option<String> = {
            let mut conn = self.pool.get().await?;
            conn.hget(self.key_skill_names(), name).await?
        };
        match id {
            Some(id) => self.load_skill(&id).await,
            None => Ok(None),
        }
    }

    async fn list_skills(&self) -> Result<Vec<Skill>> {
        self.list_ordered(&self.key_skills(), |id| self.key_skill(id))
            .await
    }

    async fn remove_skill(&self, id: &str) -> Result<bool> {
        let Some(skill) = self.load_skill(id).await? else {
            return Ok(false);
        };

        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.key_skill(id))
            .zrem(self.key_skills(), id)
            .ignore()
            .cmd("HDEL")
            .arg(self.key_skill_names())
            .arg(&skill.name)
            .ignore();
        let (deleted,): (u32,) = pipe.query_async(&mut conn).await?;
        Ok(deleted > 0)
    }
}

// ==========================================
// 历史与评价 (List, 只追加)
// ==========================================

#[async_trait]
impl LogSink for RedisPersistence {
    async fn append(&self, entry: &TaskLog) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(entry)?;
        conn.rpush::<_, _, ()>(self.key_logs(&entry.task_id), json)
            .await?;
        Ok(())
    }

    async fn history(&self, task_id: &str) -> Result<Vec<TaskLog>> {
        let mut conn = self.pool.get().await?;
        let raw: Vec<String> = conn.lrange(self.key_logs(task_id), 0, -1).await?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(MarketError::from))
            .collect()
    }
}

#[async_trait]
impl FeedbackStore for RedisPersistence {
    async fn save_feedback(&self, feedback: &TaskFeedback) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(feedback)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .rpush(self.key_feedback_by_task(&feedback.task_id), &json)
            .ignore()
            .rpush(self.key_feedback_by_worker(&feedback.worker_id), &json)
            .ignore();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn feedback_for_task(&self, task_id: &str) -> Result<Vec<TaskFeedback>> {
        self.read_feedback(self.key_feedback_by_task(task_id)).await
    }

    async fn feedback_for_worker(&self, worker_id: &str) -> Result<Vec<TaskFeedback>> {
        self.read_feedback(self.key_feedback_by_worker(worker_id))
            .await
    }
}

impl RedisPersistence {
    async fn read_feedback(&self, key: String) -> Result<Vec<TaskFeedback>> {
        let mut conn = self.pool.get().await?;
        let raw: Vec<String> = conn.lrange(key, 0, -1).await?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(MarketError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::StorageConfig;
    use crate::common::new_id;

    /// 单连接的连接池: 上一次调用遗留的连接状态一定会被下一次调用拿到
    fn single_connection_store(namespace: &str) -> RedisPersistence {
        let config = StorageConfig {
            redis_url: std::env::var(crate::common::config::ENV_REDIS_URL)
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            redis_pool_size: 1,
            namespace: namespace.to_string(),
            ..StorageConfig::default()
        };
        RedisPersistence::new(&config).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server (ERGON_REDIS_URL)"]
    async fn failed_skill_save_does_not_leave_a_watch_on_the_connection() {
        let namespace = format!("ergon-test-{}", new_id());
        let store = single_connection_store(&namespace);
        let other = single_connection_store(&namespace);

        // 已存在的技能主体损坏，save_skill 在 WATCH 之后的反序列化处失败
        let skill = Skill::new("Rust");
        let skill_key = store.key_skill(&skill.id);
        {
            let mut conn = other.pool.get().await.unwrap();
            let _: () = conn.set(&skill_key, "not json").await.unwrap();
        }
        let err = store.save_skill(&skill).await.unwrap_err();
        assert!(matches!(err, MarketError::Serialization(_)));

        // 另一个客户端改动被 WATCH 的 Key；如果 WATCH 还挂在连接上，下面的事务会被丢弃
        {
            let mut conn = other.pool.get().await.unwrap();
            let _: () = conn.set(&skill_key, "still not json").await.unwrap();
        }
        let task = Task::new("after", "acme");
        store.save(&task).await.unwrap();
        assert!(store.load(&task.id).await.unwrap().is_some());
    }
}
