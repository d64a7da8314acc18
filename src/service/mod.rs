pub mod assignment;
pub mod builder;
pub mod catalog;
pub mod context;
pub mod core;
pub mod metrics;
pub mod plugin;
pub mod plugins;
pub mod workers;

pub use assignment::{AutoAssignment, ConsentOutcome};
pub use builder::MarketplaceBuilder;
pub use catalog::{NewTask, TaskPatch};
pub use context::MarketContext;
pub use self::core::Marketplace;
pub use metrics::{MatchMetrics, MetricsSnapshot};
pub use plugin::{AssignSource, AssignmentPlugin, NoOpPlugin};
pub use workers::{NewWorker, Performer, WorkerSkill};
