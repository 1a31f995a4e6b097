use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::geo::GeofenceEvaluation;
use crate::model::location::{LocationHistoryQuery, LocationPing, LocationUpdate};
use crate::model::worker::{NewWorker, Worker, WorkerUpdate};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct WorkerQuery {
    /// Only workers still employed
    pub active_only: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerListResponse {
    pub data: Vec<Worker>,
    #[schema(example = 12)]
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct LocationResponse {
    pub ping: LocationPing,
    pub geofence: GeofenceEvaluation,
}

/// Hire a worker
#[utoipa::path(
    post,
    path = "/api/workers",
    request_body = NewWorker,
    responses(
        (status = 201, description = "Worker created", body = Worker),
        (status = 400, description = "Invalid worker", body = Object, example = json!({
            "message": "hourly rate must be positive, got 0"
        }))
    ),
    tag = "Worker"
)]
pub async fn create_worker(
    state: web::Data<AppState>,
    payload: web::Json<NewWorker>,
) -> actix_web::Result<impl Responder> {
    let new_worker = payload.into_inner().validate()?;
    let worker = state.repo.create_worker(new_worker, state.clock.now()).await?;

    info!(worker_id = worker.id, position = %worker.position, "Worker created");
    Ok(HttpResponse::Created().json(worker))
}

#[utoipa::path(
    get,
    path = "/api/workers",
    params(WorkerQuery),
    responses(
        (status = 200, description = "All workers", body = WorkerListResponse)
    ),
    tag = "Worker"
)]
pub async fn list_workers(
    state: web::Data<AppState>,
    query: web::Query<WorkerQuery>,
) -> actix_web::Result<impl Responder> {
    let data = state
        .repo
        .list_workers(query.active_only.unwrap_or(false))
        .await?;

    Ok(HttpResponse::Ok().json(WorkerListResponse {
        total: data.len(),
        data,
    }))
}

#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Worker found", body = Worker),
        (status = 404, description = "Worker not found", body = Object, example = json!({
            "message": "worker 9 not found"
        }))
    ),
    tag = "Worker"
)]
pub async fn get_worker(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let worker_id = path.into_inner();

    let worker = state
        .repo
        .get_worker(worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("worker {worker_id} not found")))?;

    Ok(HttpResponse::Ok().json(worker))
}

#[utoipa::path(
    put,
    path = "/api/workers/{worker_id}",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    request_body = WorkerUpdate,
    responses(
        (status = 200, description = "Worker updated", body = Worker),
        (status = 400, description = "Invalid update"),
        (status = 404, description = "Worker not found")
    ),
    tag = "Worker"
)]
pub async fn update_worker(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<WorkerUpdate>,
) -> actix_web::Result<impl Responder> {
    let worker_id = path.into_inner();
    let update = body.into_inner().validate()?;

    let worker = state
        .repo
        .update_worker(worker_id, update, state.clock.now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("worker {worker_id} not found")))?;

    if !worker.active {
        state.location_cache.forget(worker_id).await;
    }
    Ok(HttpResponse::Ok().json(worker))
}

/// Report a GPS position
#[utoipa::path(
    post,
    path = "/api/workers/{worker_id}/location",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    request_body = LocationUpdate,
    responses(
        (status = 200, description = "Location stored", body = LocationResponse),
        (status = 400, description = "Coordinate out of range"),
        (status = 404, description = "Worker not found")
    ),
    tag = "Location"
)]
pub async fn record_location(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<LocationUpdate>,
) -> actix_web::Result<impl Responder> {
    let worker_id = path.into_inner();
    let update = body.into_inner();

    let (ping, geofence) = state
        .locations
        .record(worker_id, update.coordinate, update.accuracy_meters)
        .await?;

    Ok(HttpResponse::Ok().json(LocationResponse { ping, geofence }))
}

#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}/locations",
    params(
        ("worker_id", Path, description = "Worker ID"),
        LocationHistoryQuery
    ),
    responses(
        (status = 200, description = "Location history, oldest first", body = LocationHistory)
    ),
    tag = "Location"
)]
pub async fn location_history(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<LocationHistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let worker_id = path.into_inner();
    let q = query.into_inner();

    let history = state
        .locations
        .history(worker_id, q.from, q.to, q.limit)
        .await?;

    Ok(HttpResponse::Ok().json(history))
}
