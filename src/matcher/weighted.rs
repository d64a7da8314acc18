use serde::{Deserialize, Serialize};

use crate::common::{MatchingConfig, SkillSet, TimeUtils, Worker};
use crate::matcher::ranking::overlap_score;

/// 加权评分的权重
///
/// 两项都归一化到 0~100，默认 80% 技能 + 20% 评分。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub skill: f64,
    pub rating: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            skill: 0.8,
            rating: 0.2,
        }
    }
}

impl From<&MatchingConfig> for ScoreWeights {
    fn from(cfg: &MatchingConfig) -> Self {
        Self {
            skill: cfg.skill_weight,
            rating: cfg.rating_weight,
        }
    }
}

/// 带加权分数的候选人
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub worker_id: String,
    /// 两位小数
    pub score: f64,
}

/// 技能匹配百分比 |matched| / |required| * 100，需要的技能为空时为 0
pub fn skill_match_percent(required: &SkillSet, worker: &Worker) -> f64 {
    if required.is_empty() {
        return 0.0;
    }
    overlap_score(required, worker) as f64 / required.len() as f64 * 100.0
}

/// score = w_skill * skill_match_percent + w_rating * (rating * 20)，保留两位小数
pub fn weighted_score(required: &SkillSet, worker: &Worker, weights: ScoreWeights) -> f64 {
    let raw = weights.skill * skill_match_percent(required, worker)
        + weights.rating * (worker.rating * 20.0);
    TimeUtils::round2(raw)
}

/// 从候选池中选出加权分最高的可用 Worker
///
/// - 只考虑 `available` 的 Worker。
/// - 分数必须 > 0。
/// - 同分取候选池中靠前的一个。
/// - `exclude` 中的 Worker 不参与 (批次内独占模式)。
pub fn best_available<'a, I>(
    required: &SkillSet,
    pool: I,
    weights: ScoreWeights,
    exclude: &[String],
) -> Option<ScoredCandidate>
where
    I: IntoIterator<Item = &'a Worker>,
{
    let mut best: Option<ScoredCandidate> = None;
    for worker in pool {
        if !worker.is_available() || exclude.contains(&worker.id) {
            continue;
        }
        let score = weighted_score(required, worker, weights);
        if score <= 0.0 {
            continue;
        }
        // 严格大于: 同分时保留先出现的
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(ScoredCandidate {
                worker_id: worker.id.clone(),
                score,
            });
        }
    }
    best
}
