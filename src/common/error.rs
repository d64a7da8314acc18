use thiserror::Error;

/// 市场统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(Error, Debug)]
pub enum MarketError {
    // ==========================================
    // 1. 基础配置与输入错误 (Configuration & Input)
    // ==========================================
    /// 配置错误
    ///
    /// - 触发场景: 启动时解析 YAML 失败、权重配置非法、环境变量格式错误。
    /// - 后果: 服务启动失败。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 请求参数校验失败
    ///
    /// - 触发场景: 标题为空、评分越界、空的 task_ids 批次等。
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 资源冲突
    ///
    /// - 触发场景: 技能名称重复、Worker 重复登记同一技能。
    #[error("Conflict: {0}")]
    Conflict(String),

    // ==========================================
    // 2. 资源不存在 (Not Found)
    // ==========================================
    /// 任务不存在
    #[error("Task {0} not found.")]
    TaskNotFound(String),

    /// Worker 不存在
    #[error("Worker {0} not found.")]
    WorkerNotFound(String),

    /// 技能不存在
    #[error("Skill {0} not found.")]
    SkillNotFound(String),

    // ==========================================
    // 3. 匹配与分配错误 (Matching & Assignment)
    // ==========================================
    /// 任务已被分配
    ///
    /// - 触发场景: 对已有 assigned_worker_id 的任务发起 consent，
    ///   或者两个并发请求竞争同一个任务时，后写入者失败。
    #[error("Task {0} is already assigned.")]
    AlreadyAssigned(String),

    /// 改派给了当前已分配的同一个 Worker
    #[error("Task {task_id} is already assigned to worker {worker_id}.")]
    SameWorker { task_id: String, worker_id: String },

    /// 声明同意的 Worker 不在候选排名中
    #[error("Worker {worker_id} is not eligible for task {task_id}.")]
    NotEligible { task_id: String, worker_id: String },

    /// 没有任何 Worker 的技能重叠分数大于 0
    #[error("No suitable workers found for the required skills of task {0}.")]
    NoSuitableWorker(String),

    /// 候选人拒绝后，排名中没有其他可回退的 Worker
    #[error("No alternative worker available for task {task_id} after {declined} declined.")]
    NoAlternative { task_id: String, declined: String },

    /// 非法的状态流转
    ///
    /// - 触发场景: 没有分配 Worker 的任务被置为 in-progress / completed。
    #[error("Task {task_id} cannot move from {from} to {to}: {reason}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
        reason: &'static str,
    },

    /// 任务没有分配 Worker，无法评价
    #[error("Task {0} has no assigned worker to review.")]
    NoAssignedWorker(String),

    // ==========================================
    // 4. 基础设施与 IO 错误 (Infrastructure & IO)
    // ==========================================
    /// 乐观锁重试耗尽
    ///
    /// - 触发场景: Redis 后端 WATCH/EXEC 连续冲突超过 `cas_retries` 次。
    /// - 处理: 属于正常竞争，客户端可稍后重试。
    #[error("Failed to acquire write ownership for task {0} (contention).")]
    LockAcquireFailed(String),

    /// Redis 交互失败
    #[cfg(feature = "distributed")]
    #[error("Redis interaction failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// Redis 连接池错误
    #[cfg(feature = "distributed")]
    #[error("Redis pool failure: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// 序列化/反序列化失败
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 通用 IO 错误
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// 持久化层通用错误
    #[error("Persistence layer failure: {0}")]
    Persistence(String),
}

impl MarketError {
    /// 判断该错误是否值得重试 (Retryable)
    ///
    /// - 返回 `true`: 网络抖动、锁竞争等暂时性故障，调用方可以退避后重试。
    /// - 返回 `false`: 业务前置条件不满足、数据损坏、配置错误，重试没有意义。
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "distributed")]
            MarketError::Redis(e) => e.is_connection_dropped() || e.is_io_error(),
            #[cfg(feature = "distributed")]
            MarketError::Pool(_) => true,

            MarketError::Io(_) => true,
            MarketError::LockAcquireFailed(_) => true,

            // 业务错误: 状态不会自己变好
            _ => false,
        }
    }

    /// 是否属于 "资源不存在" 一类
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MarketError::TaskNotFound(_)
                | MarketError::WorkerNotFound(_)
                | MarketError::SkillNotFound(_)
        )
    }

    /// 稳定的错误分类名，用于日志聚合与 HTTP 响应体
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::Config(_) => "config",
            MarketError::Validation(_) => "validation",
            MarketError::Conflict(_) => "conflict",
            MarketError::TaskNotFound(_) => "task_not_found",
            MarketError::WorkerNotFound(_) => "worker_not_found",
            MarketError::SkillNotFound(_) => "skill_not_found",
            MarketError::AlreadyAssigned(_) => "already_assigned",
            MarketError::SameWorker { .. } => "same_worker",
            MarketError::NotEligible { .. } => "not_eligible",
            MarketError::NoSuitableWorker(_) => "no_suitable_worker",
            MarketError::NoAlternative { .. } => "no_alternative",
            MarketError::InvalidTransition { .. } => "invalid_transition",
            MarketError::NoAssignedWorker(_) => "no_assigned_worker",
            MarketError::LockAcquireFailed(_) => "lock_acquire_failed",
            #[cfg(feature = "distributed")]
            MarketError::Redis(_) => "redis",
            #[cfg(feature = "distributed")]
            MarketError::Pool(_) => "redis_pool",
            MarketError::Serialization(_) => "serialization",
            MarketError::Io(_) => "io",
            MarketError::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_is_retryable_business_errors_are_not() {
        assert!(MarketError::LockAcquireFailed("t1".into()).is_retryable());
        assert!(!MarketError::AlreadyAssigned("t1".into()).is_retryable());
        assert!(
            !MarketError::NoAlternative {
                task_id: "t1".into(),
                declined: "w1".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn not_found_family() {
        assert!(MarketError::TaskNotFound("t".into()).is_not_found());
        assert!(MarketError::WorkerNotFound("w".into()).is_not_found());
        assert!(!MarketError::NoSuitableWorker("t".into()).is_not_found());
        assert_eq!(MarketError::SkillNotFound("s".into()).kind(), "skill_not_found");
    }
}
