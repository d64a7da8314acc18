use std::sync::Arc;

use tracing::debug;

use crate::common::MarketConfig;
use crate::persistence::{
    FeedbackStore, LogSink, MemoryPersistence, Persistence, SkillStore, TaskStore, WorkerStore,
};
use crate::service::plugins::MetricsPlugin;
use crate::service::{AssignmentPlugin, MarketContext, Marketplace, MatchMetrics};

/// 五个存储接口的一组实现
struct StoreSet {
    tasks: Arc<dyn TaskStore>,
    workers: Arc<dyn WorkerStore>,
    skills: Arc<dyn SkillStore>,
    logs: Arc<dyn LogSink>,
    feedback: Arc<dyn FeedbackStore>,
}

impl StoreSet {
    fn from_backend<P: Persistence>(backend: P) -> Self {
        let arc = Arc::new(backend);
        Self {
            tasks: arc.clone(),
            workers: arc.clone(),
            skills: arc.clone(),
            logs: arc.clone(),
            feedback: arc,
        }
    }
}

/// 市场构造器 (Builder Pattern)
///
/// **默认行为**:
/// - Config: Default
/// - Persistence: None (默认初始化为 MemoryPersistence)
/// - Metrics: 0 (全新计数器)
#[derive(Default)]
pub struct MarketplaceBuilder {
    /// 全局配置
    config: Option<MarketConfig>,
    /// 插件列表
    plugins: Vec<Box<dyn AssignmentPlugin>>,
    /// 持久化 (Option 用于处理默认值逻辑)
    stores: Option<StoreSet>,
    /// 单独指定的历史存储，覆盖持久化后端自带的 LogSink
    log_sink: Option<Arc<dyn LogSink>>,
    /// 全局统计指标
    metrics: Arc<MatchMetrics>,
}

impl MarketplaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置全局配置
    pub fn with_config(mut self, config: MarketConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 添加插件 (支持链式调用)
    ///
    /// **注意**: 插件的执行顺序与添加顺序一致 (FIFO)，MetricsPlugin 永远排在最前。
    pub fn with_plugin<PL>(mut self, plugin: PL) -> Self
    where
        PL: AssignmentPlugin,
    {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// 设置持久化层
    ///
    /// 接收一个同时实现了五个存储接口的后端，包装为 `Arc` 后分别强转为各个 `dyn Store`。
    pub fn with_persistence<P>(mut self, persistence: P) -> Self
    where
        P: Persistence,
    {
        self.stores = Some(StoreSet::from_backend(persistence));
        self
    }

    /// 把分配历史写到单独的存储 (例如独立的审计库)
    pub fn with_log_sink<L>(mut self, sink: L) -> Self
    where
        L: LogSink,
    {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    /// 共享一个外部持有的指标实例
    pub fn with_metrics(mut self, metrics: Arc<MatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 构建市场服务
    pub fn build(mut self) -> Marketplace {
        let config = self.config.unwrap_or_default();

        // 处理持久化层的默认逻辑
        let mut stores = self.stores.unwrap_or_else(|| {
            debug!("Marketplace build using default MemoryPersistence");
            StoreSet::from_backend(MemoryPersistence::new())
        });
        if let Some(sink) = self.log_sink {
            stores.logs = sink;
        }

        // 自动注入 MetricsPlugin
        let metrics_plugin = Box::new(MetricsPlugin::new(self.metrics.clone()));
        self.plugins.insert(0, metrics_plugin);

        let ctx = MarketContext {
            tasks: stores.tasks,
            workers: stores.workers,
            skills: stores.skills,
            logs: stores.logs,
            feedback: stores.feedback,
            config: Arc::new(config),
            metrics: self.metrics,
        };
        Marketplace::new_with_components(ctx, self.plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Task;
    use crate::service::NoOpPlugin;

    #[tokio::test]
    async fn metrics_plugin_is_injected_before_user_plugins() {
        let market = MarketplaceBuilder::new().with_plugin(NoOpPlugin).build();
        assert_eq!(market.plugins().len(), 2);

        let task = Task::new("t", "acme");
        market.context().tasks.save(&task).await.unwrap();
        market.suggest_candidate(&task.id).await.unwrap_err();
        assert_eq!(market.metrics().failures, 1);
    }

    #[tokio::test]
    async fn shared_metrics_and_backend_are_used() {
        let metrics = Arc::new(MatchMetrics::default());
        let backend = MemoryPersistence::new();
        let market = MarketplaceBuilder::new()
            .with_persistence(backend.clone())
            .with_metrics(metrics.clone())
            .build();

        let task = Task::new("t", "acme");
        backend.save(&task).await.unwrap();
        assert_eq!(market.get_task(&task.id).await.unwrap().id, task.id);

        market.suggest_candidate(&task.id).await.unwrap_err();
        assert_eq!(metrics.snapshot().failures, 1);
    }
}
