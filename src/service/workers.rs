use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{Availability, MarketError, Result, TaskStatus, TimeUtils, Worker};
use crate::persistence::TaskFilter;
use crate::service::Marketplace;

/// Worker 熟练度范围
const PROFICIENCY_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// 登记 Worker 档案的请求
#[derive(Debug, Clone, Deserialize)]
pub struct NewWorker {
    pub name: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub availability: Availability,
}

/// Worker 的一项技能及熟练度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSkill {
    pub worker_id: String,
    pub skill_id: String,
    pub proficiency: u8,
}

/// top-performers 排行中的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performer {
    pub worker_id: String,
    pub name: String,
    pub tasks_completed: usize,
    /// 评价平均分，没有评价时取 Worker 自身评分，两位小数
    pub rating: f64,
}

impl Marketplace {
    // ==========================================
    // 1. Worker 档案 (候选池)
    // ==========================================

    pub async fn register_worker(&self, new: NewWorker) -> Result<Worker> {
        if new.name.trim().is_empty() {
            return Err(MarketError::Validation("worker name is required".into()));
        }
        if !(0.0..=5.0).contains(&new.rating) {
            return Err(MarketError::Validation(
                "rating must be between 0 and 5".into(),
            ));
        }

        let worker = Worker::new(new.name, new.rating).with_availability(new.availability);
        self.context().workers.save_worker(&worker).await?;
        info!(worker_id = %worker.id, "Worker registered");
        Ok(worker)
    }

    pub async fn get_worker(&self, id: &str) -> Result<Worker> {
        self.context()
            .workers
            .load_worker(id)
            .await?
            .ok_or_else(|| MarketError::WorkerNotFound(id.to_string()))
    }

    /// 按登记顺序列出 Worker
    pub async fn list_workers(&self, availability: Option<Availability>) -> Result<Vec<Worker>> {
        self.context().workers.list_workers(availability).await
    }

    pub async fn set_availability(&self, id: &str, availability: Availability) -> Result<Worker> {
        let change = self
            .context()
            .workers
            .modify_worker(id, &|w: &mut Worker| {
                w.availability = availability;
                Ok(())
            })
            .await?;
        info!(worker_id = id, ?availability, "Worker availability changed");
        Ok(change.after)
    }

    /// 注销 Worker 档案
    ///
    /// 只把 Worker 移出候选池，已分配给它的任务和历史保持不变。
    pub async fn deregister_worker(&self, id: &str) -> Result<()> {
        if !self.context().workers.remove_worker(id).await? {
            return Err(MarketError::WorkerNotFound(id.to_string()));
        }
        info!(worker_id = id, "Worker deregistered");
        Ok(())
    }

    // ==========================================
    // 2. Worker 技能
    // ==========================================

    /// 登记技能
    ///
    /// 只影响之后的匹配，已分配的任务不受影响。
    pub async fn add_worker_skill(
        &self,
        worker_id: &str,
        skill_id: &str,
        proficiency: u8,
    ) -> Result<Worker> {
        if !PROFICIENCY_RANGE.contains(&proficiency) {
            return Err(MarketError::Validation(
                "proficiency must be between 1 and 10".into(),
            ));
        }
        self.get_skill(skill_id).await?;

        let change = self
            .context()
            .workers
            .modify_worker(worker_id, &|w: &mut Worker| {
                if w.has_skill(skill_id) {
                    return Err(MarketError::Conflict(format!(
                        "worker {} already has skill {}",
                        w.id, skill_id
                    )));
                }
                w.skills.insert(skill_id.to_string(), proficiency);
                Ok(())
            })
            .await?;
        info!(worker_id, skill_id, proficiency, "Worker skill added");
        Ok(change.after)
    }

    /// 查询 Worker 的单项技能
    pub async fn worker_skill(&self, worker_id: &str, skill_id: &str) -> Result<WorkerSkill> {
        let worker = self.get_worker(worker_id).await?;
        let proficiency = worker
            .skills
            .get(skill_id)
            .copied()
            .ok_or_else(|| MarketError::SkillNotFound(skill_id.to_string()))?;
        Ok(WorkerSkill {
            worker_id: worker.id,
            skill_id: skill_id.to_string(),
            proficiency,
        })
    }

    /// 调整已登记技能的熟练度
    pub async fn update_worker_skill(
        &self,
        worker_id: &str,
        skill_id: &str,
        proficiency: u8,
    ) -> Result<Worker> {
        if !PROFICIENCY_RANGE.contains(&proficiency) {
            return Err(MarketError::Validation(
                "proficiency must be between 1 and 10".into(),
            ));
        }

        let change = self
            .context()
            .workers
            .modify_worker(worker_id, &|w: &mut Worker| match w.skills.get_mut(skill_id) {
                Some(level) => {
                    *level = proficiency;
                    Ok(())
                }
                None => Err(MarketError::SkillNotFound(skill_id.to_string())),
            })
            .await?;
        info!(worker_id, skill_id, proficiency, "Worker skill updated");
        Ok(change.after)
    }

    pub async fn remove_worker_skill(&self, worker_id: &str, skill_id: &str) -> Result<Worker> {
        let change = self
            .context()
            .workers
            .modify_worker(worker_id, &|w: &mut Worker| {
                w.skills
                    .remove(skill_id)
                    .map(|_| ())
                    .ok_or_else(|| MarketError::SkillNotFound(skill_id.to_string()))
            })
            .await?;
        info!(worker_id, skill_id, "Worker skill removed");
        Ok(change.after)
    }

    // ==========================================
    // 3. 排行
    // ==========================================

    /// 完成任务最多的 Worker
    ///
    /// 先按完成数降序，同数再按评分降序；仍然相同时保持登记顺序。
    pub async fn top_performers(&self, limit: Option<usize>) -> Result<Vec<Performer>> {
        let ctx = self.context();
        let limit = limit.unwrap_or(self.config().matching.top_performers_limit);

        let mut completed: HashMap<String, usize> = HashMap::new();
        for task in ctx
            .tasks
            .list(&TaskFilter::by_status(TaskStatus::Completed))
            .await?
        {
            if let Some(worker_id) = task.assigned_worker_id {
                *completed.entry(worker_id).or_default() += 1;
            }
        }

        let mut performers = Vec::new();
        for worker in ctx.workers.list_workers(None).await? {
            let feedback = ctx.feedback.feedback_for_worker(&worker.id).await?;
            let rating = if feedback.is_empty() {
                worker.rating
            } else {
                feedback.iter().map(|f| f.rating).sum::<f64>() / feedback.len() as f64
            };
            performers.push(Performer {
                tasks_completed: completed.get(&worker.id).copied().unwrap_or(0),
                rating: TimeUtils::round2(rating),
                worker_id: worker.id,
                name: worker.name,
            });
        }

        performers.sort_by(|a, b| {
            b.tasks_completed
                .cmp(&a.tasks_completed)
                .then_with(|| b.rating.total_cmp(&a.rating))
        });
        performers.truncate(limit);
        Ok(performers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AssignGuard, Task};

    fn new_worker(name: &str, rating: f64) -> NewWorker {
        NewWorker {
            name: name.into(),
            rating,
            availability: Availability::Available,
        }
    }

    #[tokio::test]
    async fn register_validates_and_lists_in_order() {
        let market = Marketplace::builder().build();
        assert!(matches!(
            market.register_worker(new_worker(" ", 3.0)).await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            market.register_worker(new_worker("x", 5.1)).await,
            Err(MarketError::Validation(_))
        ));

        let a = market.register_worker(new_worker("a", 3.0)).await.unwrap();
        let b = market.register_worker(new_worker("b", 4.0)).await.unwrap();
        market.set_availability(&a.id, Availability::Offline).await.unwrap();

        let all: Vec<_> = market
            .list_workers(None)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(all, [a.id.clone(), b.id.clone()]);

        let available = market
            .list_workers(Some(Availability::Available))
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, b.id);
    }

    #[tokio::test]
    async fn worker_skills_are_validated_and_unique() {
        let market = Marketplace::builder().build();
        let worker = market.register_worker(new_worker("a", 3.0)).await.unwrap();
        let rust = market.create_skill("Rust").await.unwrap();

        assert!(matches!(
            market.add_worker_skill(&worker.id, &rust.id, 11).await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            market.add_worker_skill(&worker.id, "nope", 5).await,
            Err(MarketError::SkillNotFound(_))
        ));
        assert!(matches!(
            market.add_worker_skill("ghost", &rust.id, 5).await,
            Err(MarketError::WorkerNotFound(_))
        ));

        let updated = market.add_worker_skill(&worker.id, &rust.id, 7).await.unwrap();
        assert_eq!(updated.skills.get(&rust.id), Some(&7));
        assert!(matches!(
            market.add_worker_skill(&worker.id, &rust.id, 3).await,
            Err(MarketError::Conflict(_))
        ));

        let raised = market.update_worker_skill(&worker.id, &rust.id, 9).await.unwrap();
        assert_eq!(raised.skills.get(&rust.id), Some(&9));
        assert_eq!(
            market.worker_skill(&worker.id, &rust.id).await.unwrap(),
            WorkerSkill {
                worker_id: worker.id.clone(),
                skill_id: rust.id.clone(),
                proficiency: 9,
            }
        );
        assert!(matches!(
            market.update_worker_skill(&worker.id, &rust.id, 0).await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            market.update_worker_skill(&worker.id, "nope", 5).await,
            Err(MarketError::SkillNotFound(_))
        ));
        assert!(matches!(
            market.update_worker_skill("ghost", &rust.id, 5).await,
            Err(MarketError::WorkerNotFound(_))
        ));

        let removed = market.remove_worker_skill(&worker.id, &rust.id).await.unwrap();
        assert!(!removed.has_skill(&rust.id));
        assert!(matches!(
            market.remove_worker_skill(&worker.id, &rust.id).await,
            Err(MarketError::SkillNotFound(_))
        ));
        assert!(matches!(
            market.worker_skill(&worker.id, &rust.id).await,
            Err(MarketError::SkillNotFound(_))
        ));
    }

    #[tokio::test]
    async fn deregistered_worker_leaves_the_pool_but_keeps_tasks() {
        let market = Marketplace::builder().build();
        let worker = market.register_worker(new_worker("a", 3.0)).await.unwrap();
        let mut task = Task::new("assigned", "acme");
        task.assign_to(&worker.id, AssignGuard::Unassigned).unwrap();
        market.context().tasks.save(&task).await.unwrap();

        market.deregister_worker(&worker.id).await.unwrap();
        assert!(market.list_workers(None).await.unwrap().is_empty());
        assert!(matches!(
            market.get_worker(&worker.id).await,
            Err(MarketError::WorkerNotFound(_))
        ));
        assert!(matches!(
            market.deregister_worker(&worker.id).await,
            Err(MarketError::WorkerNotFound(_))
        ));

        let stored = market.get_task(&task.id).await.unwrap();
        assert_eq!(stored.assigned_worker_id.as_deref(), Some(worker.id.as_str()));
    }

    #[tokio::test]
    async fn top_performers_order_by_completed_then_rating() {
        let market = Marketplace::builder().build();
        let a = market.register_worker(new_worker("a", 5.0)).await.unwrap();
        let b = market.register_worker(new_worker("b", 2.0)).await.unwrap();
        let c = market.register_worker(new_worker("c", 4.0)).await.unwrap();

        // b 完成 2 个，c 完成 1 个，a 没有
        for worker in [&b.id, &b.id, &c.id] {
            let mut task = Task::new("t", "acme");
            task.assign_to(worker, AssignGuard::Unassigned).unwrap();
            task.transition(TaskStatus::Completed).unwrap();
            market.context().tasks.save(&task).await.unwrap();
            market.submit_feedback(&task.id, 3.0, None).await.unwrap();
        }

        let top = market.top_performers(None).await.unwrap();
        let order: Vec<_> = top.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert_eq!(top[0].tasks_completed, 2);
        // 有评价时取评价平均分
        assert_eq!(top[0].rating, 3.0);
        // 没有评价时取自身评分
        assert_eq!(top[2].rating, 5.0);
        assert_eq!(top[2].worker_id, a.id);

        assert_eq!(market.top_performers(Some(1)).await.unwrap().len(), 1);
    }
}
