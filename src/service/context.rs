use std::sync::Arc;

use crate::common::MarketConfig;
use crate::persistence::{FeedbackStore, LogSink, SkillStore, TaskStore, WorkerStore};
use crate::service::MatchMetrics;

/// 市场上下文 (Market Context)
///
/// **职责**:
/// 打包服务运行所需的所有共享资源，避免在函数调用时传递一长串参数。
/// 所有字段都是 Arc，Clone 是廉价的。
#[derive(Clone)]
pub struct MarketContext {
    // --- 存储 (Stores) ---
    /// 任务存储 (唯一提供 CAS 的存储)
    pub tasks: Arc<dyn TaskStore>,

    /// Worker 候选池
    pub workers: Arc<dyn WorkerStore>,

    /// 技能目录
    pub skills: Arc<dyn SkillStore>,

    /// 分配历史
    pub logs: Arc<dyn LogSink>,

    /// 评价
    pub feedback: Arc<dyn FeedbackStore>,

    // --- 配置与观测 ---
    /// 全局配置
    pub config: Arc<MarketConfig>,

    /// 全局统计指标
    pub metrics: Arc<MatchMetrics>,
}
