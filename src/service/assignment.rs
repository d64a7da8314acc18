use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::{
    AssignGuard, Availability, LogStatus, MarketError, Result, Task, TaskFeedback, TaskLog,
    TaskStatus, TimeUtils, new_id,
};
use crate::matcher::{
    ConsentDecision, RankedCandidate, ScoreWeights, best_available, best_candidate,
    rank_candidates, resolve_consent,
};
use crate::service::{AssignSource, Marketplace};

/// 评价内容的最大长度
const MAX_REVIEW_CHARS: usize = 500;

/// consent 流程的结果
#[derive(Debug, Clone, Serialize)]
pub struct ConsentOutcome {
    /// 写入后的任务
    pub task: Task,
    pub decision: ConsentDecision,
}

/// 批量自动分配中成功的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoAssignment {
    pub task_id: String,
    pub worker_id: String,
    pub match_score: f64,
}

impl Marketplace {
    // ==========================================
    // 1. 推荐候选人 (只查询)
    // ==========================================

    /// 推荐技能重叠最多的 Worker，不修改任务
    pub async fn suggest_candidate(&self, task_id: &str) -> Result<RankedCandidate> {
        match self.try_suggest(task_id).await {
            Ok(c) => Ok(c),
            Err(e) => Err(self.fail(task_id, e).await),
        }
    }

    async fn try_suggest(&self, task_id: &str) -> Result<RankedCandidate> {
        let task = self.require_task(task_id).await?;
        let pool = self.context().workers.list_workers(None).await?;
        let best = best_candidate(&task, &pool)?;

        info!(task_id, worker_id = %best.worker_id, score = best.score, "Candidate offered");
        for p in self.plugins() {
            p.on_candidate_offered(&task, &best).await;
        }
        Ok(best)
    }

    // ==========================================
    // 2. Consent 流程
    // ==========================================

    /// 处理候选人的同意/拒绝
    ///
    /// 排名每次基于最新候选池重新计算。决策是纯计算，
    /// 写入走 `AssignGuard::Unassigned` 的 CAS：并发的两个请求只有一个能成功。
    pub async fn respond_to_offer(
        &self,
        task_id: &str,
        worker_id: &str,
        consent: bool,
    ) -> Result<ConsentOutcome> {
        match self.try_respond(task_id, worker_id, consent).await {
            Ok(o) => Ok(o),
            Err(e) => Err(self.fail(task_id, e).await),
        }
    }

    async fn try_respond(
        &self,
        task_id: &str,
        worker_id: &str,
        consent: bool,
    ) -> Result<ConsentOutcome> {
        let ctx = self.context();
        let task = self.require_task(task_id).await?;
        if task.is_assigned() {
            return Err(MarketError::AlreadyAssigned(task.id));
        }
        if ctx.workers.load_worker(worker_id).await?.is_none() {
            return Err(MarketError::WorkerNotFound(worker_id.to_string()));
        }

        let pool = ctx.workers.list_workers(None).await?;
        let ranked = rank_candidates(&task, &pool);
        let decision = resolve_consent(&task, &ranked, worker_id, consent)?;
        let chosen = decision.worker().worker_id.clone();

        let change = ctx
            .tasks
            .assign(task_id, &chosen, AssignGuard::Unassigned)
            .await?;

        let (source, comment) = match &decision {
            ConsentDecision::Accepted { .. } => {
                (AssignSource::Consent, "Worker accepted the task".to_string())
            }
            ConsentDecision::FellBack { declined, .. } => (
                AssignSource::Fallback,
                format!("Worker {declined} declined, assigned to next best candidate"),
            ),
        };
        self.record_history(
            TaskLog::new(task_id, &chosen, LogStatus::Assigned).with_comment(comment),
        )
        .await;

        info!(task_id, worker_id = %chosen, consent, "Task assigned through consent");
        for p in self.plugins() {
            if !consent {
                p.on_declined(&change.after, worker_id).await;
            }
            p.on_assigned(&change.after, source).await;
        }

        Ok(ConsentOutcome {
            task: change.after,
            decision,
        })
    }

    // ==========================================
    // 3. 批量自动分配
    // ==========================================

    /// 按加权分数为一批任务自动挑选 Worker
    ///
    /// - 逐个任务顺序处理；不存在或不是 pending 的任务跳过。
    /// - 没有候选人的任务静默跳过，不出现在结果里。
    /// - 单个任务的写入冲突 (已被别人分配、乐观锁耗尽、已被删除) 只跳过该任务。
    pub async fn auto_assign(&self, task_ids: &[String]) -> Result<Vec<AutoAssignment>> {
        if task_ids.is_empty() {
            return Err(MarketError::Validation(
                "task_ids must contain at least one task id".into(),
            ));
        }

        let ctx = self.context();
        let tasks = ctx.tasks.load_batch(task_ids).await?;
        let weights = ScoreWeights::from(&self.config().matching);
        let exclusive = self.config().matching.exclusive_batch;

        let mut taken: Vec<String> = Vec::new();
        let mut assigned = Vec::new();

        for (task_id, task) in task_ids.iter().zip(tasks) {
            let Some(task) = task.filter(|t| t.status == TaskStatus::Pending) else {
                debug!(task_id = %task_id, "Skipping missing or non-pending task");
                continue;
            };

            // 每个任务重新读取候选池，批次进行中的可用状态变更对后续任务生效
            let pool = ctx
                .workers
                .list_workers(Some(Availability::Available))
                .await?;
            let Some(candidate) = best_available(&task.required_skills, &pool, weights, &taken)
            else {
                debug!(task_id = %task_id, "No candidate with a positive score");
                continue;
            };

            let change = match ctx
                .tasks
                .assign(task_id, &candidate.worker_id, AssignGuard::Pending)
                .await
            {
                Ok(change) => change,
                Err(
                    e @ (MarketError::AlreadyAssigned(_)
                    | MarketError::LockAcquireFailed(_)
                    | MarketError::TaskNotFound(_)),
                ) => {
                    warn!(task_id = %task_id, error = %e, "Auto-assign skipped a contended task");
                    continue;
                }
                Err(e) => return Err(self.fail(task_id, e).await),
            };

            self.record_history(
                TaskLog::new(task_id, &candidate.worker_id, LogStatus::Assigned)
                    .with_comment(format!("Auto-assigned with match score {}", candidate.score)),
            )
            .await;

            info!(
                task_id = %task_id,
                worker_id = %candidate.worker_id,
                score = candidate.score,
                "Task auto-assigned"
            );
            for p in self.plugins() {
                p.on_assigned(&change.after, AssignSource::Auto).await;
            }

            if exclusive {
                taken.push(candidate.worker_id.clone());
            }
            assigned.push(AutoAssignment {
                task_id: task_id.clone(),
                worker_id: candidate.worker_id,
                match_score: candidate.score,
            });
        }

        Ok(assigned)
    }

    // ==========================================
    // 4. 改派
    // ==========================================

    /// 无条件改派 (不检查技能)，状态强制回到 assigned
    pub async fn reassign(&self, task_id: &str, worker_id: &str) -> Result<Task> {
        match self.try_reassign(task_id, worker_id).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.fail(task_id, e).await),
        }
    }

    async fn try_reassign(&self, task_id: &str, worker_id: &str) -> Result<Task> {
        let ctx = self.context();
        self.require_task(task_id).await?;
        if ctx.workers.load_worker(worker_id).await?.is_none() {
            return Err(MarketError::WorkerNotFound(worker_id.to_string()));
        }

        let change = ctx
            .tasks
            .assign(task_id, worker_id, AssignGuard::Force)
            .await?;

        let comment = match &change.before.assigned_worker_id {
            Some(old) => format!("Task reassigned from {old}"),
            None => "Task reassigned".to_string(),
        };
        self.record_history(
            TaskLog::new(task_id, worker_id, LogStatus::Assigned).with_comment(comment),
        )
        .await;

        info!(
            task_id,
            worker_id,
            previous = ?change.before.assigned_worker_id,
            "Task reassigned"
        );
        for p in self.plugins() {
            p.on_assigned(&change.after, AssignSource::Reassign).await;
        }
        Ok(change.after)
    }

    // ==========================================
    // 5. 状态流转 / 评价 / 历史
    // ==========================================

    /// 显式状态变更
    ///
    /// 带 Worker 的状态 (assigned / in-progress / completed) 会写入历史。
    pub async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<Task> {
        match self.try_update_status(task_id, status).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.fail(task_id, e).await),
        }
    }

    async fn try_update_status(&self, task_id: &str, status: TaskStatus) -> Result<Task> {
        let ctx = self.context();
        let change = ctx.tasks.update_status(task_id, status).await?;

        if let (Some(log_status), Some(worker_id)) = (
            LogStatus::from_status(status),
            change.after.assigned_worker_id.as_deref(),
        ) {
            self.record_history(TaskLog::new(task_id, worker_id, log_status))
                .await;
        }

        info!(
            task_id,
            from = %change.before.status,
            to = %change.after.status,
            "Task status updated"
        );
        for p in self.plugins() {
            p.on_status_changed(&change).await;
        }
        Ok(change.after)
    }

    /// 公司对已分配的 Worker 做评价
    pub async fn submit_feedback(
        &self,
        task_id: &str,
        rating: f64,
        review: Option<String>,
    ) -> Result<TaskFeedback> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(MarketError::Validation(
                "rating must be between 0 and 5".into(),
            ));
        }
        if review
            .as_deref()
            .is_some_and(|r| r.chars().count() > MAX_REVIEW_CHARS)
        {
            return Err(MarketError::Validation(format!(
                "review must not exceed {MAX_REVIEW_CHARS} characters"
            )));
        }

        let task = self.require_task(task_id).await?;
        let worker_id = task
            .assigned_worker_id
            .ok_or_else(|| MarketError::NoAssignedWorker(task_id.to_string()))?;

        let feedback = TaskFeedback {
            id: new_id(),
            task_id: task_id.to_string(),
            worker_id,
            rating,
            review,
            created_at: TimeUtils::now(),
        };
        self.context().feedback.save_feedback(&feedback).await?;

        info!(task_id, worker_id = %feedback.worker_id, rating, "Feedback submitted");
        for p in self.plugins() {
            p.on_feedback(&feedback).await;
        }
        Ok(feedback)
    }

    /// 任务收到的评价 (提交顺序)
    pub async fn task_feedback(&self, task_id: &str) -> Result<Vec<TaskFeedback>> {
        self.require_task(task_id).await?;
        self.context().feedback.feedback_for_task(task_id).await
    }

    /// 任务的分配历史 (时间正序)
    pub async fn task_logs(&self, task_id: &str) -> Result<Vec<TaskLog>> {
        self.require_task(task_id).await?;
        self.context().logs.history(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{MarketConfig, Worker};
    use crate::persistence::{LogSink, MemoryPersistence, WorkerStore};
    use crate::service::{AssignmentPlugin, MarketplaceBuilder};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seed_worker(market: &Marketplace, worker: Worker) -> Worker {
        market.context().workers.save_worker(&worker).await.unwrap();
        worker
    }

    async fn seed_task(market: &Marketplace, task: Task) -> Task {
        market.context().tasks.save(&task).await.unwrap();
        task
    }

    fn named(name: &str, rating: f64, skills: &[&str]) -> Worker {
        let mut w = Worker::new(name, rating);
        w.id = name.to_string();
        for s in skills {
            w = w.with_skill(*s);
        }
        w
    }

    #[tokio::test]
    async fn suggest_picks_highest_overlap_without_mutating() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w2", 3.0, &["B"])).await;
        seed_worker(&market, named("w1", 3.0, &["A", "B"])).await;
        let task = seed_task(&market, Task::new("t", "acme").with_skills(["A", "B"])).await;

        let best = market.suggest_candidate(&task.id).await.unwrap();
        assert_eq!(best.worker_id, "w1");
        assert_eq!(best.score, 2);

        let stored = market.require_task(&task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(market.metrics().offers, 1);
    }

    #[tokio::test]
    async fn suggest_without_overlap_is_no_suitable_worker() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 3.0, &["X"])).await;
        let task = seed_task(&market, Task::new("t", "acme").with_skills(["A"])).await;

        let err = market.suggest_candidate(&task.id).await.unwrap_err();
        assert!(matches!(err, MarketError::NoSuitableWorker(_)));
        assert_eq!(market.metrics().failures, 1);
    }

    #[tokio::test]
    async fn decline_falls_back_and_logs() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 3.0, &["A", "B"])).await;
        seed_worker(&market, named("w2", 3.0, &["B"])).await;
        let task = seed_task(&market, Task::new("t", "acme").with_skills(["A", "B"])).await;

        let outcome = market.respond_to_offer(&task.id, "w1", false).await.unwrap();
        assert_eq!(outcome.task.assigned_worker_id.as_deref(), Some("w2"));
        assert_eq!(outcome.task.status, TaskStatus::Assigned);
        assert!(matches!(outcome.decision, ConsentDecision::FellBack { .. }));

        let logs = market.task_logs(&task.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].worker_id, "w2");
        assert_eq!(market.metrics().fallbacks, 1);

        // 已分配后任何回复都失败
        let err = market.respond_to_offer(&task.id, "w1", true).await.unwrap_err();
        assert!(matches!(err, MarketError::AlreadyAssigned(_)));
    }

    #[tokio::test]
    async fn consent_checks_worker_and_eligibility() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 3.0, &["A"])).await;
        seed_worker(&market, named("w3", 3.0, &["Z"])).await;
        let task = seed_task(&market, Task::new("t", "acme").with_skills(["A"])).await;

        let err = market.respond_to_offer(&task.id, "ghost", true).await.unwrap_err();
        assert!(matches!(err, MarketError::WorkerNotFound(_)));

        let err = market.respond_to_offer(&task.id, "w3", true).await.unwrap_err();
        assert!(matches!(err, MarketError::NotEligible { .. }));

        let err = market.respond_to_offer(&task.id, "w1", false).await.unwrap_err();
        assert!(matches!(err, MarketError::NoAlternative { .. }));

        let outcome = market.respond_to_offer(&task.id, "w1", true).await.unwrap();
        assert_eq!(outcome.task.assigned_worker_id.as_deref(), Some("w1"));
        assert_eq!(market.metrics().consents, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_consents_assign_once() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 3.0, &["A"])).await;
        seed_worker(&market, named("w2", 3.0, &["A"])).await;
        let task = seed_task(&market, Task::new("t", "acme").with_skills(["A"])).await;

        let (a, b) = tokio::join!(
            market.respond_to_offer(&task.id, "w1", true),
            market.respond_to_offer(&task.id, "w2", true),
        );
        let results = [a, b];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, MarketError::AlreadyAssigned(_)))
        );
        assert_eq!(market.task_logs(&task.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn auto_assign_uses_weighted_scores() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 4.8, &["php", "laravel"])).await;
        seed_worker(&market, named("w2", 4.5, &["react"])).await;
        seed_worker(
            &market,
            named("busy", 5.0, &["php", "laravel"]).with_availability(Availability::Busy),
        )
        .await;

        let api = seed_task(&market, Task::new("api", "acme").with_skills(["php", "laravel"])).await;
        let mut done = Task::new("done", "acme");
        done.assign_to("w2", AssignGuard::Unassigned).unwrap();
        let done = seed_task(&market, done).await;

        let ids = vec![api.id.clone(), done.id.clone(), "missing".to_string()];
        let result = market.auto_assign(&ids).await.unwrap();
        assert_eq!(
            result,
            vec![AutoAssignment {
                task_id: api.id.clone(),
                worker_id: "w1".into(),
                match_score: 99.2,
            }]
        );
        assert_eq!(market.metrics().auto_assigned, 1);

        let err = market.auto_assign(&[]).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn auto_assign_batch_exclusivity_is_configurable() {
        let shared = |exclusive: bool| {
            let mut config = MarketConfig::default();
            config.matching.exclusive_batch = exclusive;
            MarketplaceBuilder::new().with_config(config).build()
        };

        for exclusive in [false, true] {
            let market = shared(exclusive);
            seed_worker(&market, named("w1", 5.0, &["A"])).await;
            seed_worker(&market, named("w2", 1.0, &["A"])).await;
            let t1 = seed_task(&market, Task::new("t1", "acme").with_skills(["A"])).await;
            let t2 = seed_task(&market, Task::new("t2", "acme").with_skills(["A"])).await;

            let result = market.auto_assign(&[t1.id, t2.id]).await.unwrap();
            let workers: Vec<_> = result.iter().map(|a| a.worker_id.as_str()).collect();
            if exclusive {
                assert_eq!(workers, ["w1", "w2"]);
            } else {
                assert_eq!(workers, ["w1", "w1"]);
            }
        }
    }

    #[tokio::test]
    async fn reassign_forces_assigned_and_logs_previous_worker() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 3.0, &[])).await;
        seed_worker(&market, named("w2", 3.0, &[])).await;
        let task = seed_task(&market, Task::new("t", "acme")).await;

        market.reassign(&task.id, "w1").await.unwrap();
        market.update_status(&task.id, TaskStatus::InProgress).await.unwrap();

        let task = market.reassign(&task.id, "w2").await.unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_worker_id.as_deref(), Some("w2"));

        let err = market.reassign(&task.id, "w2").await.unwrap_err();
        assert!(matches!(err, MarketError::SameWorker { .. }));
        let err = market.reassign(&task.id, "ghost").await.unwrap_err();
        assert!(matches!(err, MarketError::WorkerNotFound(_)));

        let comments: Vec<_> = market
            .task_logs(&task.id)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.comment)
            .collect();
        assert_eq!(
            comments,
            [
                Some("Task reassigned".to_string()),
                None,
                Some("Task reassigned from w1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn status_updates_keep_worker_invariant() {
        let market = Marketplace::builder().build();
        let task = seed_task(&market, Task::new("t", "acme")).await;

        let err = market
            .update_status(&task.id, TaskStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));

        let cancelled = market
            .update_status(&task.id, TaskStatus::Cancelled)
            .await
            .unwrap();
        assert!(cancelled.assigned_worker_id.is_none());
        assert!(market.task_logs(&task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn feedback_requires_assigned_worker_and_valid_input() {
        let market = Marketplace::builder().build();
        seed_worker(&market, named("w1", 3.0, &[])).await;
        let task = seed_task(&market, Task::new("t", "acme")).await;

        let err = market.submit_feedback(&task.id, 4.0, None).await.unwrap_err();
        assert!(matches!(err, MarketError::NoAssignedWorker(_)));

        market.reassign(&task.id, "w1").await.unwrap();
        let err = market.submit_feedback(&task.id, 5.5, None).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        let err = market
            .submit_feedback(&task.id, 4.0, Some("x".repeat(501)))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        let fb = market
            .submit_feedback(&task.id, 4.5, Some("solid work".into()))
            .await
            .unwrap();
        assert_eq!(fb.worker_id, "w1");
        assert_eq!(market.metrics().feedback, 1);
        assert_eq!(market.task_feedback(&task.id).await.unwrap(), vec![fb]);
        assert!(matches!(
            market.task_feedback("missing").await,
            Err(MarketError::TaskNotFound(_))
        ));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AssignmentPlugin for Arc<Recorder> {
        async fn on_assigned(&self, task: &Task, source: AssignSource) {
            self.events
                .lock()
                .push(format!("{:?}:{}", source, task.assigned_worker_id.as_deref().unwrap_or("")));
        }

        async fn on_declined(&self, _task: &Task, worker_id: &str) {
            self.events.lock().push(format!("declined:{worker_id}"));
        }
    }

    #[tokio::test]
    async fn plugins_see_decline_then_assignment() {
        let recorder = Arc::new(Recorder::default());
        let market = Marketplace::builder().with_plugin(recorder.clone()).build();
        seed_worker(&market, named("w1", 3.0, &["A"])).await;
        seed_worker(&market, named("w2", 3.0, &["A"])).await;
        let task = seed_task(&market, Task::new("t", "acme").with_skills(["A"])).await;

        market.respond_to_offer(&task.id, "w1", false).await.unwrap();
        assert_eq!(*recorder.events.lock(), ["declined:w1", "Fallback:w2"]);
    }

    /// 前 `ok` 次追加成功，之后一直失败
    struct FlakyLogSink {
        inner: MemoryPersistence,
        ok: AtomicUsize,
    }

    impl FlakyLogSink {
        fn new(ok: usize) -> Self {
            Self {
                inner: MemoryPersistence::new(),
                ok: AtomicUsize::new(ok),
            }
        }
    }

    #[async_trait]
    impl LogSink for FlakyLogSink {
        async fn append(&self, entry: &TaskLog) -> Result<()> {
            let allowed = self
                .ok
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !allowed {
                return Err(MarketError::Persistence("log sink down".into()));
            }
            self.inner.append(entry).await
        }

        async fn history(&self, task_id: &str) -> Result<Vec<TaskLog>> {
            self.inner.history(task_id).await
        }
    }

    #[tokio::test]
    async fn lost_history_does_not_undo_committed_assignments() {
        let market = Marketplace::builder()
            .with_log_sink(FlakyLogSink::new(1))
            .build();
        seed_worker(&market, named("w1", 5.0, &["A"])).await;
        seed_worker(&market, named("w2", 1.0, &[])).await;

        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let t = seed_task(&market, Task::new(title, "acme").with_skills(["A"])).await;
            ids.push(t.id);
        }

        // 第一条历史写成功，之后的失败都不会中断批次
        let result = market.auto_assign(&ids).await.unwrap();
        assert_eq!(result.len(), 3);
        for id in &ids {
            let stored = market.require_task(id).await.unwrap();
            assert_eq!(stored.status, TaskStatus::Assigned);
        }
        assert_eq!(market.task_logs(&ids[0]).await.unwrap().len(), 1);
        assert!(market.task_logs(&ids[1]).await.unwrap().is_empty());

        let metrics = market.metrics();
        assert_eq!(metrics.auto_assigned, 3);
        assert_eq!(metrics.failures, 2);

        // 单个操作同样返回已提交的结果
        let task = market.reassign(&ids[0], "w2").await.unwrap();
        assert_eq!(task.assigned_worker_id.as_deref(), Some("w2"));
        let task = market
            .update_status(&ids[0], TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(market.metrics().failures, 4);
    }

    #[tokio::test]
    async fn auto_assign_skips_tasks_nobody_scores_on() {
        let market = Marketplace::builder().build();
        // 评分 0: 只有技能重叠时才有分
        seed_worker(&market, named("zero", 0.0, &["X"])).await;
        seed_worker(
            &market,
            named("offline", 5.0, &["B"]).with_availability(Availability::Offline),
        )
        .await;

        let orphan = seed_task(&market, Task::new("orphan", "acme").with_skills(["B"])).await;
        let matched = seed_task(&market, Task::new("matched", "acme").with_skills(["X"])).await;

        let result = market
            .auto_assign(&[orphan.id.clone(), matched.id.clone()])
            .await
            .unwrap();
        assert_eq!(
            result,
            vec![AutoAssignment {
                task_id: matched.id.clone(),
                worker_id: "zero".into(),
                match_score: 80.0,
            }]
        );

        let orphan = market.require_task(&orphan.id).await.unwrap();
        assert_eq!(orphan.status, TaskStatus::Pending);
        assert!(orphan.assigned_worker_id.is_none());
    }

    /// 分配后立即把 Worker 标记为 busy
    struct BusyAfterAssign {
        store: MemoryPersistence,
    }

    #[async_trait]
    impl AssignmentPlugin for BusyAfterAssign {
        async fn on_assigned(&self, task: &Task, _source: AssignSource) {
            if let Some(worker_id) = &task.assigned_worker_id {
                let _ = self
                    .store
                    .modify_worker(worker_id, &|w: &mut Worker| {
                        w.availability = Availability::Busy;
                        Ok(())
                    })
                    .await;
            }
        }
    }

    #[tokio::test]
    async fn auto_assign_sees_availability_changes_within_a_batch() {
        let store = MemoryPersistence::new();
        let market = Marketplace::builder()
            .with_persistence(store.clone())
            .with_plugin(BusyAfterAssign { store })
            .build();
        seed_worker(&market, named("w1", 5.0, &["A"])).await;
        seed_worker(&market, named("w2", 1.0, &["A"])).await;
        let t1 = seed_task(&market, Task::new("t1", "acme").with_skills(["A"])).await;
        let t2 = seed_task(&market, Task::new("t2", "acme").with_skills(["A"])).await;

        // exclusive_batch 关闭，但 w1 在第一个任务后已经不可用
        let result = market.auto_assign(&[t1.id, t2.id]).await.unwrap();
        let workers: Vec<_> = result.iter().map(|a| a.worker_id.as_str()).collect();
        assert_eq!(workers, ["w1", "w2"]);
    }
}
