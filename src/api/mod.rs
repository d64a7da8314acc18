//! HTTP 接口层
//!
//! axum 路由、请求/响应 DTO，以及 `MarketError` 到 HTTP 状态码的映射。

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use routes::{API_PREFIX, create_router, market_routes};
