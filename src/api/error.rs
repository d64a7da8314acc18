use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::common::MarketError;

/// HTTP 边界上的错误包装
///
/// 响应体: `{"error": <kind>, "message": <text>}`。
/// 5xx 不回显内部细节，只写日志。
#[derive(Debug)]
pub struct ApiError(pub MarketError);

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        Self(e)
    }
}

impl ApiError {
    /// 错误到状态码的映射
    ///
    /// - 前置条件不满足: 400
    /// - 资源不存在 / 不在候选人中 / 没有合适的 Worker: 404
    /// - 名称冲突 / 写入竞争: 409
    /// - 其余: 500
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            MarketError::Validation(_)
            | MarketError::AlreadyAssigned(_)
            | MarketError::NoAlternative { .. }
            | MarketError::SameWorker { .. }
            | MarketError::InvalidTransition { .. }
            | MarketError::NoAssignedWorker(_) => StatusCode::BAD_REQUEST,

            MarketError::TaskNotFound(_)
            | MarketError::WorkerNotFound(_)
            | MarketError::SkillNotFound(_)
            | MarketError::NotEligible { .. }
            | MarketError::NoSuitableWorker(_) => StatusCode::NOT_FOUND,

            MarketError::Conflict(_) | MarketError::LockAcquireFailed(_) => StatusCode::CONFLICT,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.0.kind();

        let message = if status.is_server_error() {
            error!(error_type, details = %self.0, "Internal error");
            "Internal server error".to_string()
        } else {
            warn!(error_type, status = status.as_u16(), details = %self.0, "Request rejected");
            self.0.to_string()
        };

        (status, Json(json!({ "error": error_type, "message": message }))).into_response()
    }
}
