use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 匹配核心指标
// 使用 Atomic 保证高并发下的计数性能
#[derive(Debug, Default)]
pub struct MatchMetrics {
    /// 推荐出去的候选人次数 (PATCH /assign)
    pub offers: AtomicU64,

    /// 候选人同意后分配成功
    pub consents: AtomicU64,

    /// 候选人拒绝后回退到下一位
    pub fallbacks: AtomicU64,

    /// 批量自动分配成功的任务数
    pub auto_assigned: AtomicU64,

    /// 改派次数
    pub reassigned: AtomicU64,

    /// 显式状态变更次数
    pub status_changes: AtomicU64,

    /// 收到的评价数
    pub feedback: AtomicU64,

    /// 分配相关操作的失败次数
    pub failures: AtomicU64,
}

/// 某一时刻的指标快照 (GET /stats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub offers: u64,
    pub consents: u64,
    pub fallbacks: u64,
    pub auto_assigned: u64,
    pub reassigned: u64,
    pub status_changes: u64,
    pub feedback: u64,
    pub failures: u64,
}

impl MatchMetrics {
    pub fn inc_offers(&self) {
        self.offers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_consents(&self) {
        self.consents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallbacks(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auto_assigned(&self) {
        self.auto_assigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reassigned(&self) {
        self.reassigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_status_changes(&self) {
        self.status_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_feedback(&self) {
        self.feedback.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录失败
    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            offers: self.offers.load(Ordering::Relaxed),
            consents: self.consents.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            auto_assigned: self.auto_assigned.load(Ordering::Relaxed),
            reassigned: self.reassigned.load(Ordering::Relaxed),
            status_changes: self.status_changes.load(Ordering::Relaxed),
            feedback: self.feedback.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
