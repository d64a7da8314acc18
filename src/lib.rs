// 1. 基础模块
pub mod common;

// 2. 匹配算法 (纯函数)
pub mod matcher;

// 3. 持久化接口与实现
pub mod persistence;

// 4. 市场服务
pub mod service;

// 5. HTTP 接口
pub mod api;

pub use common::{MarketConfig, MarketError, Result};
pub use service::{Marketplace, MarketplaceBuilder};
