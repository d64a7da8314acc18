use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::trace::TraceLayer;

use crate::api::handlers::*;
use crate::service::Marketplace;

/// 路由前缀
pub const API_PREFIX: &str = "/api/v1";

/// 业务路由 (未挂前缀、未注入状态)
pub fn market_routes() -> Router<Marketplace> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        // 任务
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/tasks/search", get(search_tasks_handler))
        .route("/tasks/auto-assign", post(auto_assign_handler))
        .route(
            "/tasks/:id",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .route("/tasks/:id/assign", patch(suggest_candidate_handler))
        .route("/tasks/:id/consent", post(consent_handler))
        .route("/tasks/:id/status", patch(update_status_handler))
        .route(
            "/tasks/:id/feedback",
            get(task_feedback_handler).post(feedback_handler),
        )
        .route("/tasks/:id/reassign", patch(reassign_handler))
        .route("/tasks/:id/logs", get(task_logs_handler))
        // 技能目录
        .route("/skills", get(list_skills_handler).post(create_skill_handler))
        .route(
            "/skills/:id",
            get(get_skill_handler)
                .put(rename_skill_handler)
                .delete(delete_skill_handler),
        )
        // Worker
        .route(
            "/workers",
            get(list_workers_handler).post(register_worker_handler),
        )
        .route("/workers/top-performers", get(top_performers_handler))
        .route(
            "/workers/:id",
            get(get_worker_handler).delete(deregister_worker_handler),
        )
        .route("/workers/:id/availability", patch(set_availability_handler))
        .route("/workers/:id/skills", post(add_worker_skill_handler))
        .route(
            "/workers/:id/skills/:skill_id",
            get(get_worker_skill_handler)
                .put(update_worker_skill_handler)
                .delete(remove_worker_skill_handler),
        )
}

/// 完整的 HTTP 应用: `/api/v1` 前缀 + 请求追踪
pub fn create_router(market: Marketplace) -> Router {
    Router::new()
        .nest(API_PREFIX, market_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(market)
}
