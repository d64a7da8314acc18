pub mod memory;
pub mod model;
#[cfg(feature = "distributed")]
pub mod redis;
pub mod traits;

pub use memory::MemoryPersistence;
pub use model::{TaskChange, TaskFilter, WorkerChange};
#[cfg(feature = "distributed")]
pub use redis::RedisPersistence;
pub use traits::{
    FeedbackStore, LogSink, Persistence, SkillStore, TaskOp, TaskStore, WorkerOp, WorkerStore,
};
