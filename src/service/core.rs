use std::sync::Arc;

use tracing::warn;

use crate::common::{MarketConfig, MarketError, Task, TaskLog};
use crate::service::{AssignmentPlugin, MarketContext, MarketplaceBuilder, MetricsSnapshot};

/// 服务 Inner 结构体
struct MarketInner {
    /// 全局上下文
    ctx: MarketContext,
    /// 插件系统
    plugins: Vec<Box<dyn AssignmentPlugin>>,
}

/// 任务市场服务 (The Engine)
///
/// 编排存储与匹配器：匹配器只做纯计算，所有写入都经过 `TaskStore::modify`。
/// 内部是 Arc，Clone 是廉价的，可以直接作为 axum 的 State。
#[derive(Clone)]
pub struct Marketplace {
    inner: Arc<MarketInner>,
}

impl Marketplace {
    /// 构造函数
    pub fn new_with_components(ctx: MarketContext, plugins: Vec<Box<dyn AssignmentPlugin>>) -> Self {
        Self {
            inner: Arc::new(MarketInner { ctx, plugins }),
        }
    }

    pub fn builder() -> MarketplaceBuilder {
        MarketplaceBuilder::new()
    }

    /// 暴露内部上下文 (存储、配置、指标)
    pub fn context(&self) -> &MarketContext {
        &self.inner.ctx
    }

    pub fn config(&self) -> &MarketConfig {
        &self.inner.ctx.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.ctx.metrics.snapshot()
    }

    pub(crate) fn plugins(&self) -> &[Box<dyn AssignmentPlugin>] {
        &self.inner.plugins
    }

    /// 任务必须存在
    pub(crate) async fn require_task(&self, id: &str) -> crate::common::Result<Task> {
        self.context()
            .tasks
            .load(id)
            .await?
            .ok_or_else(|| MarketError::TaskNotFound(id.to_string()))
    }

    /// [Hook] 失败: 通知插件后原样返回错误
    pub(crate) async fn fail(&self, task_id: &str, error: MarketError) -> MarketError {
        warn!(task_id, error_type = error.kind(), error = %error, "Assignment operation failed");
        for p in self.plugins() {
            p.on_failure(task_id, &error).await;
        }
        error
    }

    /// 追加分配历史
    ///
    /// 调用时任务的写入已经提交：历史写失败只记录并通知插件，不影响调用结果。
    pub(crate) async fn record_history(&self, entry: TaskLog) {
        if let Err(e) = self.context().logs.append(&entry).await {
            warn!(task_id = %entry.task_id, "History entry lost after a committed write");
            self.fail(&entry.task_id, e).await;
        }
    }
}
