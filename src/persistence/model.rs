use serde::{Deserialize, Serialize};

use crate::common::{Task, TaskStatus, Worker};

/// 任务列表/搜索的过滤条件
///
/// 所有字段为 `None` 时返回全部任务；多个条件之间是 AND。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// 需要的技能中包含该技能 ID
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
}

impl TaskFilter {
    pub fn by_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self
                .skill
                .as_deref()
                .is_none_or(|s| task.required_skills.contains(s))
            && self
                .worker_id
                .as_deref()
                .is_none_or(|w| task.assigned_worker_id.as_deref() == Some(w))
    }
}

/// 一次原子修改前后的快照
///
/// 服务层据此决定要写哪条历史、触发哪些插件事件。
#[derive(Debug, Clone)]
pub struct TaskChange {
    pub before: Task,
    pub after: Task,
}

impl TaskChange {
    /// 修改是否换了 Worker
    pub fn worker_changed(&self) -> bool {
        self.before.assigned_worker_id != self.after.assigned_worker_id
    }

    pub fn status_changed(&self) -> bool {
        self.before.status != self.after.status
    }
}

/// Worker 原子修改前后的快照
#[derive(Debug, Clone)]
pub struct WorkerChange {
    pub before: Worker,
    pub after: Worker,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AssignGuard;

    #[test]
    fn filter_combines_conditions() {
        let mut task = Task::new("t", "c").with_skills(["rust", "sql"]);
        task.assign_to("w1", AssignGuard::Unassigned).unwrap();

        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter::by_status(TaskStatus::Assigned).matches(&task));
        assert!(!TaskFilter::by_status(TaskStatus::Pending).matches(&task));

        let filter = TaskFilter {
            status: Some(TaskStatus::Assigned),
            skill: Some("rust".into()),
            worker_id: Some("w1".into()),
        };
        assert!(filter.matches(&task));

        let other_worker = TaskFilter {
            worker_id: Some("w2".into()),
            ..TaskFilter::default()
        };
        assert!(!other_worker.matches(&task));
    }
}
