pub mod config;
pub mod error;
pub mod model;
pub mod time;
pub(crate) mod utils;

// 导出配置
pub use config::{MarketConfig, MatchingConfig, StorageBackend};

// 导出错误类型
pub use error::{MarketError, Result};

// 导出核心模型
pub use model::{
    AssignGuard, Availability, LogStatus, Skill, SkillSet, Task, TaskFeedback, TaskLog,
    TaskStatus, Worker,
};

pub use time::TimeUtils;
// 内部工具的快捷访问
pub(crate) use utils::new_id;
