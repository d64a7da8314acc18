use async_trait::async_trait;
use serde::Serialize;

use crate::common::{MarketError, Task, TaskFeedback};
use crate::matcher::RankedCandidate;
use crate::persistence::TaskChange;

/// 任务是通过哪条流程分配出去的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignSource {
    /// 候选人同意
    Consent,
    /// 候选人拒绝，回退到下一位
    Fallback,
    /// 批量自动分配
    Auto,
    /// 管理员改派
    Reassign,
}

/// 分配流程插件/钩子接口
///
/// 用户可以通过实现此 Trait 来介入市场的分配生命周期。
/// 常见用途：
/// - 自定义日志/监控 (Metrics)
/// - 通知投递 (把 on_assigned 转发给消息系统)
/// - 审计
///
/// 钩子在状态已经写入存储之后调用，不能否决操作。
#[async_trait]
pub trait AssignmentPlugin: Send + Sync + 'static {
    /// 推荐了一个候选人 (只查询，任务未改变)
    async fn on_candidate_offered(&self, _task: &Task, _candidate: &RankedCandidate) {}

    /// 任务被分配给了 Worker
    async fn on_assigned(&self, _task: &Task, _source: AssignSource) {}

    /// 候选人拒绝了任务
    async fn on_declined(&self, _task: &Task, _worker_id: &str) {}

    /// 显式状态变更完成
    async fn on_status_changed(&self, _change: &TaskChange) {}

    /// 收到一条评价
    async fn on_feedback(&self, _feedback: &TaskFeedback) {}

    /// [失败] 分配相关操作失败
    async fn on_failure(&self, _task_id: &str, _error: &MarketError) {}
}

// ==========================================
// 默认的空插件 (No-Op)
// ==========================================

pub struct NoOpPlugin;

#[async_trait]
impl AssignmentPlugin for NoOpPlugin {}
