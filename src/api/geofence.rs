use actix_web::{HttpResponse, Responder, web};

use crate::geo::Coordinate;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/geofences",
    responses(
        (status = 200, description = "Configured zones", body = [GeofenceZone])
    ),
    tag = "Geofence"
)]
pub async fn list_zones(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.locations.zones())
}

/// Classify a coordinate without recording it
#[utoipa::path(
    post,
    path = "/api/geofences/check",
    request_body = Coordinate,
    responses(
        (status = 200, description = "Zone membership", body = GeofenceEvaluation),
        (status = 400, description = "Coordinate out of range")
    ),
    tag = "Geofence"
)]
pub async fn check_point(
    state: web::Data<AppState>,
    body: web::Json<Coordinate>,
) -> actix_web::Result<impl Responder> {
    let eval = state.locations.check(body.into_inner())?;
    Ok(HttpResponse::Ok().json(eval))
}
