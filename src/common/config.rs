use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::error::{MarketError, Result};

/// 配置文件路径环境变量
pub const ENV_CONFIG_PATH: &str = "ERGON_CONFIG_PATH";
/// 监听地址覆盖
pub const ENV_BIND_ADDR: &str = "ERGON_BIND_ADDR";
/// Redis 地址覆盖
pub const ENV_REDIS_URL: &str = "ERGON_REDIS_URL";

/// 存储后端选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 进程内存 (默认)
    ///
    /// - 机制: DashMap 分片锁，单进程内保证单任务单写者。
    /// - 适用场景: 开发、测试、单实例部署。
    Memory,

    /// Redis (需要 `distributed` feature)
    ///
    /// - 机制: WATCH/MULTI/EXEC 乐观锁，多实例之间保证单任务单写者。
    Redis,
}

// ==========================================
// 1. 服务配置 (ServerConfig)
// ==========================================
/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    ///
    /// - 默认值: `0.0.0.0:8080`
    pub bind_addr: String,

    /// 优雅停机超时 (秒)
    ///
    /// - 说明: 收到 Ctrl-C 后等待在途请求完成的最大时间。
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            shutdown_timeout_secs: 30,
        }
    }
}

// ==========================================
// 2. 匹配配置 (MatchingConfig)
// ==========================================
/// 匹配与自动分配策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// 技能匹配百分比的权重
    ///
    /// - 默认值: 0.8
    pub skill_weight: f64,

    /// 评分 (归一化到 0~100) 的权重
    ///
    /// - 默认值: 0.2
    pub rating_weight: f64,

    /// 批量自动分配时，同一个 Worker 是否只能拿到一个任务
    ///
    /// - 默认值: false (同一批次内同一个 Worker 可以被分配多个任务)
    /// - 设为 true: 批次内已分配的 Worker 会从后续任务的候选池中剔除。
    pub exclusive_batch: bool,

    /// top-performers 接口的默认返回条数
    ///
    /// - 默认值: 5
    pub top_performers_limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            skill_weight: 0.8,
            rating_weight: 0.2,
            exclusive_batch: false,
            top_performers_limit: 5,
        }
    }
}

// ==========================================
// 3. 存储配置 (StorageConfig)
// ==========================================
/// 持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 存储后端
    pub backend: StorageBackend,

    /// Redis 连接串 (仅 Redis 后端)
    pub redis_url: String,

    /// Redis 连接池大小
    ///
    /// - 默认值: 核心数 * 2
    #[cfg(feature = "distributed")]
    pub redis_pool_size: usize,

    /// 命名空间 (用于 Redis Key 前缀)
    ///
    /// - 默认值: "ergon"
    pub namespace: String,

    /// 乐观锁冲突最大重试次数
    ///
    /// - 默认值: 5
    /// - 超过后返回 `LockAcquireFailed`。
    pub cas_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            #[cfg(feature = "distributed")]
            redis_pool_size: num_cpus::get() * 2,
            namespace: "ergon".to_string(),
            cas_retries: 5,
        }
    }
}

// ==========================================
// 4. 日志配置 (LoggingConfig)
// ==========================================
/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 指令，`RUST_LOG` 存在时以其为准
    ///
    /// - 默认值: "info,tower_http=info"
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=info".to_string(),
        }
    }
}

// ==========================================
// 5. 总配置入口 (MarketConfig)
// ==========================================

/// 市场服务总配置
///
/// 使用分层结构组织配置项。支持 `serde` 序列化，可直接从 YAML 加载，
/// 缺省的段落使用各自的 `Default`。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketConfig {
    /// HTTP 服务
    #[serde(default)]
    pub server: ServerConfig,

    /// 匹配策略
    #[serde(default)]
    pub matching: MatchingConfig,

    /// 存储
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MarketConfig {
    /// 加载配置
    ///
    /// 1. `ERGON_CONFIG_PATH` 存在时读取该 YAML 文件，否则使用默认值；
    /// 2. 应用环境变量覆盖 (`ERGON_BIND_ADDR`, `ERGON_REDIS_URL`)；
    /// 3. 校验。
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(ENV_CONFIG_PATH).ok() {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 从 YAML 文件加载 (不做环境变量覆盖)
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MarketError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// 从 YAML 字符串加载
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| MarketError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
        if let Ok(url) = std::env::var(ENV_REDIS_URL) {
            self.storage.redis_url = url;
        }
    }

    /// 校验配置的逻辑一致性
    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        if !m.skill_weight.is_finite() || !m.rating_weight.is_finite() {
            return Err(MarketError::Config("matching weights must be finite".into()));
        }
        if m.skill_weight < 0.0 || m.rating_weight < 0.0 {
            return Err(MarketError::Config(
                "matching weights must not be negative".into(),
            ));
        }
        if m.skill_weight + m.rating_weight <= 0.0 {
            return Err(MarketError::Config(
                "at least one matching weight must be positive".into(),
            ));
        }
        if self.server.bind_addr.trim().is_empty() {
            return Err(MarketError::Config("server.bind_addr is empty".into()));
        }
        if self.storage.backend == StorageBackend::Redis && !cfg!(feature = "distributed") {
            return Err(MarketError::Config(
                "redis backend requires the `distributed` feature".into(),
            ));
        }
        Ok(())
    }
}
