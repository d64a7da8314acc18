use std::sync::Arc;

use async_trait::async_trait;

use crate::common::{MarketError, Task, TaskFeedback};
use crate::matcher::RankedCandidate;
use crate::persistence::TaskChange;
use crate::service::{AssignSource, AssignmentPlugin, MatchMetrics};

/// 指标插件，由 Builder 自动注入到插件列表的第一位
pub struct MetricsPlugin {
    metrics: Arc<MatchMetrics>,
}

impl MetricsPlugin {
    pub fn new(metrics: Arc<MatchMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl AssignmentPlugin for MetricsPlugin {
    async fn on_candidate_offered(&self, _task: &Task, _candidate: &RankedCandidate) {
        self.metrics.inc_offers();
    }

    async fn on_assigned(&self, _task: &Task, source: AssignSource) {
        match source {
            AssignSource::Consent => self.metrics.inc_consents(),
            AssignSource::Fallback => self.metrics.inc_fallbacks(),
            AssignSource::Auto => self.metrics.inc_auto_assigned(),
            AssignSource::Reassign => self.metrics.inc_reassigned(),
        }
    }

    async fn on_status_changed(&self, _change: &TaskChange) {
        self.metrics.inc_status_changes();
    }

    async fn on_feedback(&self, _feedback: &TaskFeedback) {
        self.metrics.inc_feedback();
    }

    async fn on_failure(&self, _task_id: &str, _error: &MarketError) {
        self.metrics.inc_failures();
    }
}
