use actix_web::{HttpResponse, Responder, web};

use crate::model::time_entry::{TimeEntryQuery, UpdateNotes};
use crate::state::AppState;
use crate::store::EntryFilter;

#[utoipa::path(
    get,
    path = "/api/time-entries",
    params(TimeEntryQuery),
    responses(
        (status = 200, description = "Entries whose work date is in the range", body = [TimeEntry]),
        (status = 400, description = "Start after end")
    ),
    tag = "TimeEntry"
)]
pub async fn list_entries(
    state: web::Data<AppState>,
    query: web::Query<TimeEntryQuery>,
) -> actix_web::Result<impl Responder> {
    let q = query.into_inner();
    let entries = state
        .ledger
        .list(EntryFilter {
            start: q.start,
            end: q.end,
            status: q.status,
            worker_id: q.worker_id,
        })
        .await?;

    Ok(HttpResponse::Ok().json(entries))
}

#[utoipa::path(
    get,
    path = "/api/time-entries/active",
    responses(
        (status = 200, description = "Open entries", body = [TimeEntry])
    ),
    tag = "TimeEntry"
)]
pub async fn list_active(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(state.ledger.list_active().await?))
}

#[utoipa::path(
    get,
    path = "/api/time-entries/{entry_id}",
    params(
        ("entry_id", Path, description = "Time entry ID")
    ),
    responses(
        (status = 200, body = TimeEntry),
        (status = 404, description = "Time entry not found")
    ),
    tag = "TimeEntry"
)]
pub async fn get_entry(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(state.ledger.get(path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/time-entries/{entry_id}/notes",
    params(
        ("entry_id", Path, description = "Time entry ID")
    ),
    request_body = UpdateNotes,
    responses(
        (status = 200, body = TimeEntry),
        (status = 404, description = "Time entry not found"),
        (status = 409, description = "Entry already approved")
    ),
    tag = "TimeEntry"
)]
pub async fn update_notes(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateNotes>,
) -> actix_web::Result<impl Responder> {
    let entry = state
        .ledger
        .update_notes(path.into_inner(), body.into_inner().notes)
        .await?;

    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    put,
    path = "/api/time-entries/{entry_id}/approve",
    params(
        ("entry_id", Path, description = "Time entry ID")
    ),
    responses(
        (status = 200, body = TimeEntry),
        (status = 404, description = "Time entry not found"),
        (status = 409, description = "Entry still open or already approved")
    ),
    tag = "TimeEntry"
)]
pub async fn approve_entry(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(state.ledger.approve(path.into_inner()).await?))
}
