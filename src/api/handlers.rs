use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::error::ApiError;
use crate::common::{Availability, Skill, Task, TaskFeedback, TaskLog, TaskStatus, Worker};
use crate::matcher::RankedCandidate;
use crate::persistence::TaskFilter;
use crate::service::{
    AutoAssignment, ConsentOutcome, Marketplace, MetricsSnapshot, NewTask, NewWorker, Performer,
    TaskPatch, WorkerSkill,
};

type ApiResult<T> = Result<T, ApiError>;

// ==================== REQUEST/RESPONSE DTOs ====================

#[derive(Deserialize, Debug, Default)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize, Debug)]
pub struct CreateTaskRequest {
    /// 发布任务的公司
    pub created_by: String,
    #[serde(flatten)]
    pub task: NewTask,
}

#[derive(Deserialize, Debug)]
pub struct AutoAssignRequest {
    #[serde(default)]
    pub task_ids: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct AutoAssignResponse {
    pub assigned: Vec<AutoAssignment>,
}

#[derive(Deserialize, Debug)]
pub struct ConsentRequest {
    pub worker_id: String,
    pub consent: bool,
}

#[derive(Deserialize, Debug)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

#[derive(Deserialize, Debug)]
pub struct FeedbackRequest {
    pub rating: f64,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ReassignRequest {
    pub worker_id: String,
}

#[derive(Deserialize, Debug)]
pub struct SkillRequest {
    pub name: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct ListWorkersQuery {
    pub availability: Option<Availability>,
}

#[derive(Deserialize, Debug, Default)]
pub struct TopPerformersQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
pub struct AvailabilityRequest {
    pub availability: Availability,
}

#[derive(Deserialize, Debug)]
pub struct WorkerSkillRequest {
    pub skill_id: String,
    pub proficiency: u8,
}

#[derive(Deserialize, Debug)]
pub struct ProficiencyRequest {
    pub proficiency: u8,
}

// ==================== SYSTEM ====================

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn stats_handler(State(market): State<Marketplace>) -> Json<MetricsSnapshot> {
    Json(market.metrics())
}

// ==================== TASK HANDLERS ====================

pub async fn list_tasks_handler(
    State(market): State<Marketplace>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(market.list_tasks(query.status).await?))
}

pub async fn search_tasks_handler(
    State(market): State<Marketplace>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(market.search_tasks(&filter).await?))
}

pub async fn create_task_handler(
    State(market): State<Marketplace>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = market.create_task(request.task, &request.created_by).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    Ok(Json(market.get_task(&id).await?))
}

pub async fn update_task_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<Task>> {
    Ok(Json(market.update_task(&id, patch).await?))
}

pub async fn delete_task_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    market.delete_task(&id).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn auto_assign_handler(
    State(market): State<Marketplace>,
    Json(request): Json<AutoAssignRequest>,
) -> ApiResult<Json<AutoAssignResponse>> {
    let assigned = market.auto_assign(&request.task_ids).await?;
    Ok(Json(AutoAssignResponse { assigned }))
}

pub async fn suggest_candidate_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<RankedCandidate>> {
    Ok(Json(market.suggest_candidate(&id).await?))
}

pub async fn consent_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<ConsentRequest>,
) -> ApiResult<Json<ConsentOutcome>> {
    let outcome = market
        .respond_to_offer(&id, &request.worker_id, request.consent)
        .await?;
    Ok(Json(outcome))
}

pub async fn update_status_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(market.update_status(&id, request.status).await?))
}

pub async fn feedback_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<(StatusCode, Json<TaskFeedback>)> {
    let feedback = market
        .submit_feedback(&id, request.rating, request.review)
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn reassign_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<ReassignRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(market.reassign(&id, &request.worker_id).await?))
}

pub async fn task_feedback_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TaskFeedback>>> {
    Ok(Json(market.task_feedback(&id).await?))
}

pub async fn task_logs_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TaskLog>>> {
    Ok(Json(market.task_logs(&id).await?))
}

// ==================== SKILL HANDLERS ====================

pub async fn list_skills_handler(State(market): State<Marketplace>) -> ApiResult<Json<Vec<Skill>>> {
    Ok(Json(market.list_skills().await?))
}

pub async fn create_skill_handler(
    State(market): State<Marketplace>,
    Json(request): Json<SkillRequest>,
) -> ApiResult<(StatusCode, Json<Skill>)> {
    let skill = market.create_skill(&request.name).await?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn get_skill_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Skill>> {
    Ok(Json(market.get_skill(&id).await?))
}

pub async fn rename_skill_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<SkillRequest>,
) -> ApiResult<Json<Skill>> {
    Ok(Json(market.rename_skill(&id, &request.name).await?))
}

pub async fn delete_skill_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    market.delete_skill(&id).await?;
    Ok(Json(json!({ "deleted": id })))
}

// ==================== WORKER HANDLERS ====================

pub async fn list_workers_handler(
    State(market): State<Marketplace>,
    Query(query): Query<ListWorkersQuery>,
) -> ApiResult<Json<Vec<Worker>>> {
    Ok(Json(market.list_workers(query.availability).await?))
}

pub async fn register_worker_handler(
    State(market): State<Marketplace>,
    Json(request): Json<NewWorker>,
) -> ApiResult<(StatusCode, Json<Worker>)> {
    let worker = market.register_worker(request).await?;
    Ok((StatusCode::CREATED, Json(worker)))
}

pub async fn get_worker_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(market.get_worker(&id).await?))
}

pub async fn deregister_worker_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    market.deregister_worker(&id).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn top_performers_handler(
    State(market): State<Marketplace>,
    Query(query): Query<TopPerformersQuery>,
) -> ApiResult<Json<Vec<Performer>>> {
    Ok(Json(market.top_performers(query.limit).await?))
}

pub async fn set_availability_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<AvailabilityRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(market.set_availability(&id, request.availability).await?))
}

pub async fn add_worker_skill_handler(
    State(market): State<Marketplace>,
    Path(id): Path<String>,
    Json(request): Json<WorkerSkillRequest>,
) -> ApiResult<(StatusCode, Json<Worker>)> {
    let worker = market
        .add_worker_skill(&id, &request.skill_id, request.proficiency)
        .await?;
    Ok((StatusCode::CREATED, Json(worker)))
}

pub async fn get_worker_skill_handler(
    State(market): State<Marketplace>,
    Path((id, skill_id)): Path<(String, String)>,
) -> ApiResult<Json<WorkerSkill>> {
    Ok(Json(market.worker_skill(&id, &skill_id).await?))
}

pub async fn update_worker_skill_handler(
    State(market): State<Marketplace>,
    Path((id, skill_id)): Path<(String, String)>,
    Json(request): Json<ProficiencyRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(
        market
            .update_worker_skill(&id, &skill_id, request.proficiency)
            .await?,
    ))
}

pub async fn remove_worker_skill_handler(
    State(market): State<Marketplace>,
    Path((id, skill_id)): Path<(String, String)>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(market.remove_worker_skill(&id, &skill_id).await?))
}
