use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::common::{MarketError, Result, Skill, Task, TaskStatus, TimeUtils};
use crate::persistence::TaskFilter;
use crate::service::Marketplace;

/// 任务标题的最大长度
const MAX_TITLE_CHARS: usize = 255;
/// 技能名称的最大长度
const MAX_SKILL_NAME_CHARS: usize = 100;

/// 发布任务的请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 技能 ID 列表 (重复项合并)
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// 部分更新 (不包含状态与分配)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required_skills: Option<Vec<String>>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(MarketError::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(MarketError::Validation(format!(
            "title must not exceed {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_schedule(estimated_duration: Option<u32>, deadline: Option<&DateTime<Utc>>) -> Result<()> {
    if estimated_duration == Some(0) {
        return Err(MarketError::Validation(
            "estimated_duration must be at least 1 hour".into(),
        ));
    }
    if deadline.is_some_and(|d| !TimeUtils::is_on_or_after_today(d)) {
        return Err(MarketError::Validation(
            "deadline must not be before today".into(),
        ));
    }
    Ok(())
}

/// 技能名称: 非空、不超过 100 个字符、只含 ASCII 字母数字和空白
fn validate_skill_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MarketError::Validation("skill name is required".into()));
    }
    if name.chars().count() > MAX_SKILL_NAME_CHARS {
        return Err(MarketError::Validation(format!(
            "skill name must not exceed {MAX_SKILL_NAME_CHARS} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
    {
        return Err(MarketError::Validation(
            "skill name may only contain letters, digits and spaces".into(),
        ));
    }
    Ok(())
}

impl Marketplace {
    // ==========================================
    // 1. 任务目录
    // ==========================================

    /// 发布任务，永远以 pending 状态创建
    pub async fn create_task(&self, new: NewTask, created_by: &str) -> Result<Task> {
        validate_title(&new.title)?;
        validate_schedule(new.estimated_duration, new.deadline.as_ref())?;
        if created_by.trim().is_empty() {
            return Err(MarketError::Validation("created_by is required".into()));
        }
        self.ensure_skills_exist(&new.required_skills).await?;

        let mut task = Task::new(new.title, created_by).with_skills(new.required_skills);
        task.description = new.description;
        task.estimated_duration = new.estimated_duration;
        task.deadline = new.deadline;

        self.context().tasks.save(&task).await?;
        info!(task_id = %task.id, created_by, "Task created");
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        self.require_task(id).await
    }

    /// 列出任务，可按状态过滤
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let filter = TaskFilter {
            status,
            ..TaskFilter::default()
        };
        self.context().tasks.list(&filter).await
    }

    /// 按技能 / 状态 / Worker 搜索，条件之间是 AND
    pub async fn search_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.context().tasks.list(filter).await
    }

    /// 部分更新任务内容
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        validate_schedule(patch.estimated_duration, patch.deadline.as_ref())?;
        if let Some(skills) = &patch.required_skills {
            self.ensure_skills_exist(skills).await?;
        }

        let change = self
            .context()
            .tasks
            .modify(id, &|task: &mut Task| {
                if let Some(title) = &patch.title {
                    task.title = title.clone();
                }
                if let Some(description) = &patch.description {
                    task.description = Some(description.clone());
                }
                if let Some(skills) = &patch.required_skills {
                    task.required_skills = skills.iter().cloned().collect();
                }
                if let Some(hours) = patch.estimated_duration {
                    task.estimated_duration = Some(hours);
                }
                if let Some(deadline) = patch.deadline {
                    task.deadline = Some(deadline);
                }
                Ok(())
            })
            .await?;

        info!(task_id = id, epoch = change.after.epoch, "Task updated");
        Ok(change.after)
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        if !self.context().tasks.remove(id).await? {
            return Err(MarketError::TaskNotFound(id.to_string()));
        }
        info!(task_id = id, "Task deleted");
        Ok(())
    }

    async fn ensure_skills_exist(&self, skill_ids: &[String]) -> Result<()> {
        for id in skill_ids {
            if self.context().skills.load_skill(id).await?.is_none() {
                return Err(MarketError::Validation(format!("unknown skill id {id}")));
            }
        }
        Ok(())
    }

    // ==========================================
    // 2. 技能目录
    // ==========================================

    pub async fn create_skill(&self, name: &str) -> Result<Skill> {
        validate_skill_name(name)?;
        self.ensure_skill_name_free(name, None).await?;
        let skill = Skill::new(name);
        self.context().skills.save_skill(&skill).await?;
        info!(skill_id = %skill.id, name, "Skill created");
        Ok(skill)
    }

    pub async fn get_skill(&self, id: &str) -> Result<Skill> {
        self.context()
            .skills
            .load_skill(id)
            .await?
            .ok_or_else(|| MarketError::SkillNotFound(id.to_string()))
    }

    pub async fn list_skills(&self) -> Result<Vec<Skill>> {
        self.context().skills.list_skills().await
    }

    pub async fn rename_skill(&self, id: &str, name: &str) -> Result<Skill> {
        validate_skill_name(name)?;
        let mut skill = self.get_skill(id).await?;
        self.ensure_skill_name_free(name, Some(id)).await?;
        skill.name = name.to_string();
        self.context().skills.save_skill(&skill).await?;
        Ok(skill)
    }

    /// 删除技能目录条目
    ///
    /// 已引用该技能的任务和 Worker 不受影响。
    /// 名称已被其他技能占用时提前返回 `Conflict` (存储层仍会在写入时原子地再检查一次)
    async fn ensure_skill_name_free(&self, name: &str, owner: Option<&str>) -> Result<()> {
        match self.context().skills.find_skill_by_name(name).await? {
            Some(existing) if Some(existing.id.as_str()) != owner => Err(MarketError::Conflict(
                format!("skill '{name}' already exists with id {}", existing.id),
            )),
            _ => Ok(()),
        }
    }

    pub async fn delete_skill(&self, id: &str) -> Result<()> {
        if !self.context().skills.remove_skill(id).await? {
            return Err(MarketError::SkillNotFound(id.to_string()));
        }
        info!(skill_id = id, "Skill deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn create_task_validates_and_starts_pending() {
        let market = Marketplace::builder().build();
        let rust = market.create_skill("Rust").await.unwrap();

        let err = market
            .create_task(NewTask::default(), "acme")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        let unknown = NewTask {
            title: "api".into(),
            required_skills: vec!["nope".into()],
            ..NewTask::default()
        };
        assert!(matches!(
            market.create_task(unknown, "acme").await,
            Err(MarketError::Validation(_))
        ));

        let late = NewTask {
            title: "api".into(),
            deadline: Some(TimeUtils::now() - Duration::days(2)),
            ..NewTask::default()
        };
        assert!(market.create_task(late, "acme").await.is_err());

        let task = market
            .create_task(
                NewTask {
                    title: "api".into(),
                    required_skills: vec![rust.id.clone(), rust.id.clone()],
                    estimated_duration: Some(8),
                    ..NewTask::default()
                },
                "acme",
            )
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.required_skills.len(), 1);
        assert_eq!(market.get_task(&task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn update_task_patches_content_only() {
        let market = Marketplace::builder().build();
        let task = market
            .create_task(
                NewTask {
                    title: "old".into(),
                    ..NewTask::default()
                },
                "acme",
            )
            .await
            .unwrap();

        let patched = market
            .update_task(
                &task.id,
                TaskPatch {
                    title: Some("new".into()),
                    estimated_duration: Some(3),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.title, "new");
        assert_eq!(patched.estimated_duration, Some(3));
        assert_eq!(patched.status, TaskStatus::Pending);
        assert_eq!(patched.epoch, task.epoch + 1);

        let err = market
            .update_task(
                &task.id,
                TaskPatch {
                    estimated_duration: Some(0),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        market.delete_task(&task.id).await.unwrap();
        assert!(matches!(
            market.delete_task(&task.id).await,
            Err(MarketError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn search_combines_filters() {
        let market = Marketplace::builder().build();
        let rust = market.create_skill("Rust").await.unwrap();
        let with_skill = market
            .create_task(
                NewTask {
                    title: "a".into(),
                    required_skills: vec![rust.id.clone()],
                    ..NewTask::default()
                },
                "acme",
            )
            .await
            .unwrap();
        market
            .create_task(
                NewTask {
                    title: "b".into(),
                    ..NewTask::default()
                },
                "acme",
            )
            .await
            .unwrap();

        let hits = market
            .search_tasks(&TaskFilter {
                skill: Some(rust.id.clone()),
                status: Some(TaskStatus::Pending),
                worker_id: None,
            })
            .await
            .unwrap();
        assert_eq!(hits, vec![with_skill]);
        assert_eq!(market.list_tasks(None).await.unwrap().len(), 2);
        assert!(
            market
                .list_tasks(Some(TaskStatus::Completed))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn skill_catalogue_enforces_names() {
        let market = Marketplace::builder().build();
        let skill = market.create_skill("Machine Learning").await.unwrap();

        assert!(matches!(
            market.create_skill("Machine Learning").await,
            Err(MarketError::Conflict(_))
        ));
        assert!(matches!(
            market.create_skill("C++").await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            market.create_skill(&"a".repeat(101)).await,
            Err(MarketError::Validation(_))
        ));

        let renamed = market.rename_skill(&skill.id, "ML").await.unwrap();
        assert_eq!(market.get_skill(&skill.id).await.unwrap(), renamed);
        // 改成自己当前的名字不算冲突，抢占别人的名字才算
        market.rename_skill(&skill.id, "ML").await.unwrap();
        let other = market.create_skill("Statistics").await.unwrap();
        match market.rename_skill(&other.id, "ML").await {
            Err(MarketError::Conflict(msg)) => assert!(msg.contains(&skill.id)),
            other => panic!("expected conflict, got {other:?}"),
        }
        market.delete_skill(&other.id).await.unwrap();

        market.delete_skill(&skill.id).await.unwrap();
        assert!(matches!(
            market.get_skill(&skill.id).await,
            Err(MarketError::SkillNotFound(_))
        ));
        assert!(market.list_skills().await.unwrap().is_empty());
    }
}
