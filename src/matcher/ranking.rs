use serde::{Deserialize, Serialize};

use crate::common::{MarketError, Result, SkillSet, Task, Worker};

/// 排名中的候选人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub worker_id: String,
    pub name: String,
    /// 技能重叠数 |R ∩ S_w|
    pub score: usize,
}

/// 技能重叠分数
///
/// 需要的技能为空时恒为 0。
pub fn overlap_score(required: &SkillSet, worker: &Worker) -> usize {
    required.iter().filter(|skill| worker.has_skill(skill)).count()
}

/// 对候选池按技能重叠数排名
///
/// - 只保留 score > 0 的 Worker，0 分的永远不是候选人。
/// - 降序；同分保持候选池原有顺序 (稳定排序)。
/// - 纯函数，相同输入得到相同输出。
pub fn rank_candidates(task: &Task, pool: &[Worker]) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = pool
        .iter()
        .filter_map(|worker| {
            let score = overlap_score(&task.required_skills, worker);
            (score > 0).then(|| RankedCandidate {
                worker_id: worker.id.clone(),
                name: worker.name.clone(),
                score,
            })
        })
        .collect();

    // sort_by 是稳定排序
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// 排名第一的候选人 (只查询，不修改任务)
pub fn best_candidate(task: &Task, pool: &[Worker]) -> Result<RankedCandidate> {
    rank_candidates(task, pool)
        .into_iter()
        .next()
        .ok_or_else(|| MarketError::NoSuitableWorker(task.id.clone()))
}
