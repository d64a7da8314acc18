use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::config::StorageConfig;
use crate::common::error::{MarketError, Result};

/// Redis 持久化实现
///
/// - 数据主体: String JSON，一个实体一个 Key。
/// - 顺序索引: ZSET，Score 为全局递增序号，列表接口按它返回创建顺序。
/// - 并发: `compare_and_swap` 用 WATCH/MULTI/EXEC 乐观锁实现单写者，
///   冲突时重放修改闭包，最多 `cas_retries` 次。
#[derive(Clone)]
pub struct RedisPersistence {
    /// Redis 客户端 连接池
    pub(super) pool: Pool,

    /// Key 前缀 (命名空间)
    /// e.g. "ergon" -> "ergon:tasks", "ergon:task:xyz"
    pub(super) namespace: String,

    /// 乐观锁冲突最大重试次数
    pub(super) cas_retries: u32,
}

impl std::fmt::Debug for RedisPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPersistence")
            .field("namespace", &self.namespace)
            .field("cas_retries", &self.cas_retries)
            .finish()
    }
}

impl RedisPersistence {
    /// 创建新实例
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let mut cfg = Config::from_url(config.redis_url.as_str());
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.redis_pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| MarketError::Config(format!("redis pool: {e}")))?;

        Ok(Self {
            pool,
            namespace: config.namespace.clone(),
            cas_retries: config.cas_retries,
        })
    }

    // --- Key 生成辅助函数 ---

    /// 全局递增序号 (String INCR)
    pub(super) fn key_seq(&self) -> String {
        format!("{}:seq", self.namespace)
    }

    pub(super) fn key_task(&self, id: &str) -> String {
        format!("{}:task:{}", self.namespace, id)
    }

    /// 任务创建顺序索引 (ZSET)
    pub(super) fn key_tasks(&self) -> String {
        format!("{}:tasks", self.namespace)
    }

    pub(super) fn key_worker(&self, id: &str) -> String {
        format!("{}:worker:{}", self.namespace, id)
    }

    /// Worker 登记顺序索引 (ZSET)
    pub(super) fn key_workers(&self) -> String {
        format!("{}:workers", self.namespace)
    }

    pub(super) fn key_skill(&self, id: &str) -> String {
        format!("{}:skill:{}", self.namespace, id)
    }

    /// 技能创建顺序索引 (ZSET)
    pub(super) fn key_skills(&self) -> String {
        format!("{}:skills", self.namespace)
    }

    /// 技能名称唯一索引 (Hash: name -> id)
    pub(super) fn key_skill_names(&self) -> String {
        format!("{}:skill_names", self.namespace)
    }

    /// 任务历史 (List)
    pub(super) fn key_logs(&self, task_id: &str) -> String {
        format!("{}:logs:{}", self.namespace, task_id)
    }

    pub(super) fn key_feedback_by_task(&self, task_id: &str) -> String {
        format!("{}:feedback:task:{}", self.namespace, task_id)
    }

    pub(super) fn key_feedback_by_worker(&self, worker_id: &str) -> String {
        format!("{}:feedback:worker:{}", self.namespace, worker_id)
    }

    // --- 通用读写 ---

    /// 写入实体并登记顺序 (ZADD NX: 覆盖写不改变原有顺序)
    pub(super) async fn put_ordered<T: Serialize + Sync>(
        &self,
        key: &str,
        index: &str,
        id: &str,
        value: &T,
    ) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(value)?;
        let seq: u64 = conn.incr(self.key_seq(), 1).await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(key, json)
            .ignore()
            .cmd("ZADD")
            .arg(index)
            .arg("NX")
            .arg(seq)
            .arg(id)
            .ignore();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    pub(super) async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.pool.get().await?;
        let json: Option<String> = conn.get(key).await?;
        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// 按顺序索引读出全部实体 (ZRANGE + MGET)
    ///
    /// 索引里有、数据已被删除的 ID 直接跳过。
    pub(super) async fn list_ordered<T, K>(&self, index: &str, key_of: K) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        K: Fn(&str) -> String + Send,
    {
        let mut conn = self.pool.get().await?;
        let ids: Vec<String> = conn.zrange(index, 0, -1).await?;
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let keys: Vec<String> = ids.iter().map(|id| key_of(id)).collect();
        let json_list: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut results = Vec::with_capacity(json_list.len());
        for s in json_list.into_iter().flatten() {
            results.push(serde_json::from_str(&s)?);
        }
        Ok(results)
    }

    /// [核心] 乐观锁读-改-写
    ///
    /// 1. WATCH key
    /// 2. GET + 反序列化，交给 `apply` 计算新值 (前置条件在这里检查)
    /// 3. MULTI SET EXEC；EXEC 返回 nil 说明期间有其他写者，重来
    ///
    /// `apply` 失败或 Key 不存在时 UNWATCH 并直接返回错误。
    pub(super) async fn compare_and_swap<T, F>(
        &self,
        key: &str,
        id: &str,
        missing: fn(String) -> MarketError,
        apply: F,
    ) -> Result<(T, T)>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fn(&T) -> Result<T> + Send + Sync,
    {
        let mut conn = self.pool.get().await?;

        for attempt in 0..=self.cas_retries {
            match Self::try_swap(&mut conn, key, &apply).await {
                Ok(Swap::Committed(before, after)) => return Ok((before, after)),
                Ok(Swap::Conflict) => {
                    tracing::debug!(key, attempt, "CAS conflict, retrying");
                }
                Ok(Swap::Missing) => {
                    let _ = redis::cmd("UNWATCH").query_async::<()>(&mut conn).await;
                    return Err(missing(id.to_string()));
                }
                Err(e) => {
                    let _ = redis::cmd("UNWATCH").query_async::<()>(&mut conn).await;
                    return Err(e);
                }
            }
        }

        Err(MarketError::LockAcquireFailed(id.to_string()))
    }

    async fn try_swap<T, F>(conn: &mut Connection, key: &str, apply: &F) -> Result<Swap<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fn(&T) -> Result<T> + Send + Sync,
    {
        redis::cmd("WATCH").arg(key).query_async::<()>(&mut *conn).await?;

        let raw: Option<String> = conn.get(key).await?;
        let Some(raw) = raw else {
            return Ok(Swap::Missing);
        };
        let before: T = serde_json::from_str(&raw)?;
        let after = apply(&before)?;
        let json = serde_json::to_string(&after)?;

        let mut pipe = redis::pipe();
        pipe.atomic().set(key, json).ignore();
        // EXEC 返回 nil: WATCH 的 Key 被改过，事务被丢弃
        let committed: Option<()> = pipe.query_async(&mut *conn).await?;

        Ok(match committed {
            Some(()) => Swap::Committed(before, after),
            None => Swap::Conflict,
        })
    }
}

/// 一次乐观锁尝试的结果
enum Swap<T> {
    Committed(T, T),
    Conflict,
    Missing,
}
