use serde::Serialize;

use crate::common::{MarketError, Result, Task};
use crate::matcher::ranking::RankedCandidate;

/// Consent 决策结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsentDecision {
    /// 候选人同意，分配给他
    Accepted { worker: RankedCandidate },
    /// 候选人拒绝，回退到排名中的下一位
    FellBack {
        declined: String,
        worker: RankedCandidate,
    },
}

impl ConsentDecision {
    /// 最终被分配的候选人
    pub fn worker(&self) -> &RankedCandidate {
        match self {
            ConsentDecision::Accepted { worker } | ConsentDecision::FellBack { worker, .. } => {
                worker
            }
        }
    }
}

/// 处理一次 consent 回复 (纯决策，不修改任务)
///
/// - 任务已有 Worker: `AlreadyAssigned`，与 consent 取值无关。
/// - 同意: worker 必须在排名中，否则 `NotEligible`。
/// - 拒绝: 按排名顺序跳过拒绝者，取第一个剩余条目；没有则 `NoAlternative`。
///
/// 只处理一次拒绝。连续拒绝需要调用方基于最新候选池重新排名后再次调用。
pub fn resolve_consent(
    task: &Task,
    ranked: &[RankedCandidate],
    worker_id: &str,
    consent: bool,
) -> Result<ConsentDecision> {
    if task.is_assigned() {
        return Err(MarketError::AlreadyAssigned(task.id.clone()));
    }

    if consent {
        return ranked
            .iter()
            .find(|c| c.worker_id == worker_id)
            .map(|c| ConsentDecision::Accepted { worker: c.clone() })
            .ok_or_else(|| MarketError::NotEligible {
                task_id: task.id.clone(),
                worker_id: worker_id.to_string(),
            });
    }

    ranked
        .iter()
        .find(|c| c.worker_id != worker_id)
        .map(|c| ConsentDecision::FellBack {
            declined: worker_id.to_string(),
            worker: c.clone(),
        })
        .ok_or_else(|| MarketError::NoAlternative {
            task_id: task.id.clone(),
            declined: worker_id.to_string(),
        })
}
