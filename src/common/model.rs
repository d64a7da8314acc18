use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::common::error::{MarketError, Result};
use crate::common::{TimeUtils, new_id};

/// 技能 ID 集合
///
/// 使用有序集合: 顺序无关、重复自动合并，序列化结果稳定。
pub type SkillSet = BTreeSet<String>;

// ==========================================
// 1. 任务状态枚举 (TaskStatus)
// ==========================================

/// 任务生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// 等待中
    /// - 公司刚发布，尚未选定 Worker。
    Pending,

    /// 已分配
    /// - 已选定 Worker (consent / auto-assign / reassign)。
    Assigned,

    /// 进行中
    InProgress,

    /// 已完成
    Completed,

    /// 已取消
    Cancelled,
}

impl TaskStatus {
    /// 该状态是否要求存在 assigned_worker_id
    pub fn requires_worker(&self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Completed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 2. Worker 可用状态 (Availability)
// ==========================================

/// Worker 自报的可用状态，只有 `Available` 参与自动分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Busy,
    Offline,
}

// ==========================================
// 3. 分配守卫 (AssignGuard)
// ==========================================

/// 分配时的前置条件 (在存储层的单写者临界区内检查)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignGuard {
    /// 任务当前必须没有 Worker (consent 流程)
    Unassigned,
    /// 任务当前必须是 pending 且没有 Worker (自动分配)
    Pending,
    /// 无条件覆盖 (reassign)，但拒绝同一个 Worker
    Force,
}

// ==========================================
// 4. 核心任务数据 (Task)
// ==========================================

/// 任务
///
/// 不变量: `assigned_worker_id.is_some()` 当且仅当 `status.requires_worker()`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 全局唯一的任务 ID
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// 需要的技能 ID 集合 (可以为空)
    #[serde(default)]
    pub required_skills: SkillSet,

    /// 预计耗时 (小时)
    #[serde(default)]
    pub estimated_duration: Option<u32>,

    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    pub status: TaskStatus,

    #[serde(default)]
    pub assigned_worker_id: Option<String>,

    /// 发布任务的公司 ID
    pub created_by: String,

    /// 版本号
    ///
    /// - 每次状态变更 +1，作为存储层 CAS 的栅栏令牌。
    #[serde(default)]
    pub epoch: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 创建一个 pending 任务
    pub fn new(title: impl Into<String>, created_by: impl Into<String>) -> Self {
        let now = TimeUtils::now();
        Self {
            id: new_id(),
            title: title.into(),
            description: None,
            required_skills: SkillSet::new(),
            estimated_duration: None,
            deadline: None,
            status: TaskStatus::Pending,
            assigned_worker_id: None,
            created_by: created_by.into(),
            epoch: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 设置需要的技能 (重复项自动合并)
    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }

    /// 更新最后活动时间
    pub fn touch(&mut self) {
        self.updated_at = TimeUtils::now();
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_worker_id.is_some()
    }

    /// 在守卫条件下把任务分配给 Worker
    ///
    /// 返回被替换掉的旧 Worker (仅 `Force` 时可能存在)。
    pub fn assign_to(&mut self, worker_id: &str, guard: AssignGuard) -> Result<Option<String>> {
        match guard {
            AssignGuard::Unassigned => {
                if self.is_assigned() {
                    return Err(MarketError::AlreadyAssigned(self.id.clone()));
                }
            }
            AssignGuard::Pending => {
                if self.is_assigned() || self.status != TaskStatus::Pending {
                    return Err(MarketError::AlreadyAssigned(self.id.clone()));
                }
            }
            AssignGuard::Force => {
                if self.assigned_worker_id.as_deref() == Some(worker_id) {
                    return Err(MarketError::SameWorker {
                        task_id: self.id.clone(),
                        worker_id: worker_id.to_string(),
                    });
                }
            }
        }
        let previous = self.assigned_worker_id.replace(worker_id.to_string());
        self.status = TaskStatus::Assigned;
        Ok(previous)
    }

    /// 显式状态流转
    ///
    /// - pending / cancelled: 清除 assigned_worker_id
    /// - assigned / in-progress / completed: 必须已经有 Worker
    pub fn transition(&mut self, to: TaskStatus) -> Result<()> {
        if to.requires_worker() && !self.is_assigned() {
            return Err(MarketError::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
                reason: "task has no assigned worker",
            });
        }
        if !to.requires_worker() {
            self.assigned_worker_id = None;
        }
        self.status = to;
        Ok(())
    }
}

// ==========================================
// 5. Worker
// ==========================================

/// Worker 档案 (匹配器的候选池)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,

    /// 技能 ID -> 熟练度 (1~10)
    #[serde(default)]
    pub skills: BTreeMap<String, u8>,

    /// 质量评分 [0, 5]
    pub rating: f64,

    #[serde(default)]
    pub availability: Availability,

    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(name: impl Into<String>, rating: f64) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            skills: BTreeMap::new(),
            rating,
            availability: Availability::Available,
            created_at: TimeUtils::now(),
        }
    }

    /// 添加技能 (Builder 风格，熟练度默认 1)
    pub fn with_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skills.insert(skill_id.into(), 1);
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.skills.contains_key(skill_id)
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

// ==========================================
// 6. 技能目录 / 日志 / 评价
// ==========================================

/// 技能目录条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
}

impl Skill {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
        }
    }
}

/// 历史记录里允许出现的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogStatus {
    Assigned,
    InProgress,
    Completed,
}

impl LogStatus {
    /// 只有带 Worker 的状态才会进入历史
    pub fn from_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Assigned => Some(LogStatus::Assigned),
            TaskStatus::InProgress => Some(LogStatus::InProgress),
            TaskStatus::Completed => Some(LogStatus::Completed),
            TaskStatus::Pending | TaskStatus::Cancelled => None,
        }
    }
}

/// 分配历史 (只追加)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: String,
    pub task_id: String,
    pub worker_id: String,
    pub status: LogStatus,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskLog {
    pub fn new(task_id: &str, worker_id: &str, status: LogStatus) -> Self {
        Self {
            id: new_id(),
            task_id: task_id.to_string(),
            worker_id: worker_id.to_string(),
            status,
            comment: None,
            created_at: TimeUtils::now(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// 公司对 Worker 的评价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFeedback {
    pub id: String,
    pub task_id: String,
    pub worker_id: String,
    /// [0, 5]
    pub rating: f64,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}
