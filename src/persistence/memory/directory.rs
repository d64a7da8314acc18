use async_trait::async_trait;

use super::MemoryPersistence;
use crate::common::error::{MarketError, Result};
use crate::common::model::{Availability, Skill, Worker};
use crate::persistence::model::WorkerChange;
use crate::persistence::traits::{SkillStore, WorkerOp, WorkerStore};

// ==========================================
// Worker 候选池
// ==========================================

#[async_trait]
impl WorkerStore for MemoryPersistence {
    async fn save_worker(&self, worker: &Worker) -> Result<()> {
        self.upsert(&self.workers, &worker.id, worker.clone());
        Ok(())
    }

    async fn load_worker(&self, id: &str) -> Result<Option<Worker>> {
        Ok(self.workers.get(id).map(|slot| slot.value.clone()))
    }

    async fn list_workers(&self, availability: Option<Availability>) -> Result<Vec<Worker>> {
        Ok(Self::ordered(&self.workers, |w| {
            availability.is_none_or(|a| w.availability == a)
        }))
    }

    async fn modify_worker(&self, id: &str, op: WorkerOp<'_>) -> Result<WorkerChange> {
        let mut slot = self
            .workers
            .get_mut(id)
            .ok_or_else(|| MarketError::WorkerNotFound(id.to_string()))?;

        let before = slot.value.clone();
        let mut after = before.clone();
        op(&mut after)?;
        slot.value = after.clone();
        Ok(WorkerChange { before, after })
    }

    async fn remove_worker(&self, id: &str) -> Result<bool> {
        Ok(self.workers.remove(id).is_some())
    }
}

// ==========================================
// 技能目录
// ==========================================

#[async_trait]
impl SkillStore for MemoryPersistence {
    async fn save_skill(&self, skill: &Skill) -> Result<()> {
        let mut names = self.skill_names.lock();

        if let Some(owner) = names.get(&skill.name) {
            if owner != &skill.id {
                return Err(MarketError::Conflict(format!(
                    "skill name '{}' is already taken",
                    skill.name
                )));
            }
        }

        // 改名: 释放旧名称
        if let Some(old) = self.skills.get(&skill.id).map(|s| s.value.name.clone()) {
            if old != skill.name {
                names.remove(&old);
            }
        }

        names.insert(skill.name.clone(), skill.id.clone());
        self.upsert(&self.skills, &skill.id, skill.clone());
        Ok(())
    }

    async fn load_skill(&self, id: &str) -> Result<Option<Skill>> {
        Ok(self.skills.get(id).map(|slot| slot.value.clone()))
    }

    async fn find_skill_by_name(&self, name: &str) -> Result<Option<Skill>> {
        let id = self.skill_names.lock().get(name).cloned();
        Ok(id.and_then(|id| self.skills.get(&id).map(|slot| slot.value.clone())))
    }

    async fn list_skills(&self) -> Result<Vec<Skill>> {
        Ok(Self::ordered(&self.skills, |_| true))
    }

    async fn remove_skill(&self, id: &str) -> Result<bool> {
        let mut names = self.skill_names.lock();
        match self.skills.remove(id) {
            Some((_, slot)) => {
                names.remove(&slot.value.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
