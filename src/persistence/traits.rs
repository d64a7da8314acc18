use async_trait::async_trait;

use crate::common::error::Result;
use crate::common::model::{
    AssignGuard, Availability, Skill, Task, TaskFeedback, TaskLog, TaskStatus, Worker,
};
use crate::persistence::model::{TaskChange, TaskFilter, WorkerChange};

/// 在单写者临界区内执行的任务修改闭包
///
/// 返回 `Err` 时不写入任何东西。Redis 后端在冲突时会重放闭包，所以必须是 `Fn`。
pub type TaskOp<'a> = &'a (dyn Fn(&mut Task) -> Result<()> + Send + Sync);

/// Worker 修改闭包，语义同 [`TaskOp`]
pub type WorkerOp<'a> = &'a (dyn Fn(&mut Worker) -> Result<()> + Send + Sync);

// ==========================================
// 1. 任务存储接口 (TaskStore) - 系统的核心
// ==========================================

/// 任务存储接口
///
/// **职责**: 任务的持久化、查询，以及分配相关的原子读-判-写。
/// **并发**: `modify` 是唯一的写入口 (save 只用于创建/导入)，
/// 实现层必须保证同一任务同一时刻只有一个 `modify` 在执行判定与写入，
/// 以此关闭 "两个 consent 同时通过未分配检查" 的竞态。
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// 保存任务 (Save)
    ///
    /// 如果 ID 已存在，则覆盖更新，保留原有的创建顺序。
    async fn save(&self, task: &Task) -> Result<()>;

    /// 加载任务 (Load)
    async fn load(&self, id: &str) -> Result<Option<Task>>;

    /// 批量加载任务 (Load Batch)
    ///
    /// 返回值与 `ids` 一一对应，不存在的位置为 `None`。
    async fn load_batch(&self, ids: &[String]) -> Result<Vec<Option<Task>>>;

    /// 按条件列出任务，结果按创建顺序排列
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// 移除任务 (Remove)
    ///
    /// 返回任务此前是否存在。
    async fn remove(&self, id: &str) -> Result<bool>;

    /// [核心] 原子修改 (Compare-And-Swap)
    ///
    /// 1. 取出当前任务快照；
    /// 2. 在快照上执行 `op` (前置条件检查 + 修改)；
    /// 3. `op` 成功则 epoch + 1、刷新 updated_at 并写回。
    ///
    /// 任务不存在返回 `TaskNotFound`。
    async fn modify(&self, id: &str, op: TaskOp<'_>) -> Result<TaskChange>;

    /// 在守卫条件下分配 Worker
    async fn assign(&self, id: &str, worker_id: &str, guard: AssignGuard) -> Result<TaskChange> {
        self.modify(id, &|task: &mut Task| task.assign_to(worker_id, guard).map(|_| ()))
            .await
    }

    /// 显式状态流转
    async fn update_status(&self, id: &str, status: TaskStatus) -> Result<TaskChange> {
        self.modify(id, &|task: &mut Task| task.transition(status)).await
    }
}

// ==========================================
// 2. Worker 存储接口 (WorkerStore) - 候选池
// ==========================================

#[async_trait]
pub trait WorkerStore: Send + Sync + 'static {
    /// 保存 Worker 档案 (覆盖写，保留登记顺序)
    async fn save_worker(&self, worker: &Worker) -> Result<()>;

    async fn load_worker(&self, id: &str) -> Result<Option<Worker>>;

    /// 列出 Worker
    ///
    /// - 结果按登记顺序排列，这个顺序就是匹配算法里 "同分保持原序" 的原序。
    /// - `availability` 为 `Some` 时只返回该状态的 Worker。
    async fn list_workers(&self, availability: Option<Availability>) -> Result<Vec<Worker>>;

    /// 原子修改 Worker (登记技能、切换可用状态)
    ///
    /// Worker 不存在返回 `WorkerNotFound`。
    async fn modify_worker(&self, id: &str, op: WorkerOp<'_>) -> Result<WorkerChange>;

    async fn remove_worker(&self, id: &str) -> Result<bool>;
}

// ==========================================
// 3. 技能目录接口 (SkillStore)
// ==========================================

#[async_trait]
pub trait SkillStore: Send + Sync + 'static {
    /// 保存技能
    ///
    /// 名称必须唯一：已有其他 ID 使用同名时返回 `Conflict`，检查与写入是原子的。
    async fn save_skill(&self, skill: &Skill) -> Result<()>;

    async fn load_skill(&self, id: &str) -> Result<Option<Skill>>;

    async fn find_skill_by_name(&self, name: &str) -> Result<Option<Skill>>;

    /// 按创建顺序列出
    async fn list_skills(&self) -> Result<Vec<Skill>>;

    async fn remove_skill(&self, id: &str) -> Result<bool>;
}

// ==========================================
// 4. 历史记录接口 (LogSink)
// ==========================================

/// 只追加的分配历史
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    async fn append(&self, entry: &TaskLog) -> Result<()>;

    /// 某个任务的全部历史，按追加顺序 (时间正序)
    async fn history(&self, task_id: &str) -> Result<Vec<TaskLog>>;
}

// ==========================================
// 5. 评价存储接口 (FeedbackStore)
// ==========================================

#[async_trait]
pub trait FeedbackStore: Send + Sync + 'static {
    async fn save_feedback(&self, feedback: &TaskFeedback) -> Result<()>;

    async fn feedback_for_task(&self, task_id: &str) -> Result<Vec<TaskFeedback>>;

    async fn feedback_for_worker(&self, worker_id: &str) -> Result<Vec<TaskFeedback>>;
}

/// 完整的持久化后端
///
/// 任何同时实现了五个存储接口的类型都自动实现它，
/// 方便 Builder 用一个实例同时注入所有存储。
pub trait Persistence: TaskStore + WorkerStore + SkillStore + LogSink + FeedbackStore {}

impl<P> Persistence for P where P: TaskStore + WorkerStore + SkillStore + LogSink + FeedbackStore {}
