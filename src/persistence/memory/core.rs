use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::common::model::{Skill, Task, TaskFeedback, TaskLog, Worker};

/// 带插入序号的存储槽
///
/// DashMap 本身无序，列表接口需要按创建顺序返回，所以额外记录一个全局递增序号。
#[derive(Debug, Clone)]
pub(super) struct Slot<T> {
    pub(super) seq: u64,
    pub(super) value: T,
}

/// 内存持久化实现 (In-Memory Persistence)
///
/// 同时实现了 TaskStore / WorkerStore / SkillStore / LogSink / FeedbackStore。
/// - DashMap: 分片锁，`modify` 在分片写锁内完成 "读-判-写"，天然单写者。
/// - 内部全是 Arc，Clone 是廉价的，多个服务实例可以共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    /// 全局插入序号
    pub(super) seq: Arc<AtomicU64>,

    /// 【数据仓库】任务: ID -> Task
    pub(super) tasks: Arc<DashMap<String, Slot<Task>>>,

    /// 【候选池】Worker: ID -> Worker
    pub(super) workers: Arc<DashMap<String, Slot<Worker>>>,

    /// 【技能目录】Skill: ID -> Skill
    pub(super) skills: Arc<DashMap<String, Slot<Skill>>>,

    /// 【唯一索引】技能名称 -> 技能 ID
    /// - 技能的增删改都要先拿这把锁，保证名称检查与写入是原子的
    pub(super) skill_names: Arc<Mutex<HashMap<String, String>>>,

    /// 【历史】任务 ID -> 追加顺序的日志
    pub(super) logs: Arc<DashMap<String, Vec<TaskLog>>>,

    /// 【评价】追加顺序
    pub(super) feedback: Arc<RwLock<Vec<TaskFeedback>>>,
}

impl MemoryPersistence {
    /// 创建一个空的内存持久化实例
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// 插入或覆盖，覆盖时保留原来的序号
    pub(super) fn upsert<T>(&self, map: &DashMap<String, Slot<T>>, id: &str, value: T) {
        match map.entry(id.to_string()) {
            Entry::Occupied(mut e) => e.get_mut().value = value,
            Entry::Vacant(e) => {
                e.insert(Slot {
                    seq: self.next_seq(),
                    value,
                });
            }
        }
    }

    /// 按插入顺序取出所有满足条件的值
    pub(super) fn ordered<T, F>(map: &DashMap<String, Slot<T>>, pred: F) -> Vec<T>
    where
        T: Clone,
        F: Fn(&T) -> bool,
    {
        let mut hits: Vec<(u64, T)> = map
            .iter()
            .filter(|entry| pred(&entry.value().value))
            .map(|entry| (entry.value().seq, entry.value().value.clone()))
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        hits.into_iter().map(|(_, v)| v).collect()
    }
}
