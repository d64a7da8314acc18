//! 任务与 Worker 的匹配算法
//!
//! 全部是基于快照的纯函数：不读写存储、不持有状态。
//! 并发安全 (单任务单写者) 由持久化层的 CAS 保证，不在这里处理。

pub mod consent;
pub mod ranking;
pub mod weighted;

pub use consent::{ConsentDecision, resolve_consent};
pub use ranking::{RankedCandidate, best_candidate, overlap_score, rank_candidates};
pub use weighted::{ScoreWeights, ScoredCandidate, best_available, weighted_score};
