use actix_web::{HttpResponse, Responder, web};

use crate::service::attendance::TransitionSource;
use crate::state::AppState;

/// Manual clock-in
#[utoipa::path(
    post,
    path = "/api/attendance/{worker_id}/clock-in",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Clocked in", body = AttendanceUpdate),
        (status = 404, description = "Worker not found"),
        (status = 409, description = "Already clocked in", body = Object, example = json!({
            "message": "cannot clock in while clocked_in"
        }))
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let update = state
        .attendance
        .clock_in(path.into_inner(), TransitionSource::Manual, None)
        .await?;

    Ok(HttpResponse::Ok().json(update))
}

/// Manual clock-out
///
/// Without an active time entry this changes nothing and returns no entry.
#[utoipa::path(
    post,
    path = "/api/attendance/{worker_id}/clock-out",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Clocked out", body = AttendanceUpdate),
        (status = 404, description = "Worker not found")
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let update = state
        .attendance
        .clock_out(path.into_inner(), TransitionSource::Manual)
        .await?;

    Ok(HttpResponse::Ok().json(update))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{worker_id}/break-start",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Break started", body = AttendanceUpdate),
        (status = 409, description = "Not clocked in")
    ),
    tag = "Attendance"
)]
pub async fn break_start(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let update = state.attendance.start_break(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(update))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{worker_id}/break-end",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Break ended", body = AttendanceUpdate),
        (status = 409, description = "Not on break")
    ),
    tag = "Attendance"
)]
pub async fn break_end(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let update = state.attendance.end_break(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(update))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{worker_id}/travel-start",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Traveling between sites", body = AttendanceUpdate),
        (status = 409, description = "Not clocked in")
    ),
    tag = "Attendance"
)]
pub async fn travel_start(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let update = state.attendance.start_travel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(update))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{worker_id}/travel-end",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Back on site", body = AttendanceUpdate),
        (status = 409, description = "Not traveling")
    ),
    tag = "Attendance"
)]
pub async fn travel_end(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let update = state.attendance.end_travel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(update))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test, web};
    use chrono::Duration;
    use serde_json::{Value, json};

    use crate::routes;
    use crate::state::testing::test_state;

    #[actix_web::test]
    async fn clock_in_and_out_over_http() {
        let (state, clock) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api").configure(routes::register_api)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/workers")
            .set_json(json!({
                "name": "Dale Whitmore",
                "position": "Paver Operator",
                "hourly_rate": 20.0,
                "hire_date": "2024-03-11"
            }))
            .to_request();
        let worker: Value = test::call_and_read_body_json(&app, req).await;
        let id = worker["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/api/attendance/{id}/clock-in"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri(&format!("/api/attendance/{id}/clock-in"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        clock.advance(Duration::hours(9));
        let req = test::TestRequest::post()
            .uri(&format!("/api/attendance/{id}/clock-out"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "clocked_out");
        assert_eq!(body["entry"]["overtime_hours"], 1.0);
        assert_eq!(body["entry"]["total_pay"], 190.0);
        assert_eq!(body["entry"]["status"], "completed");
    }

    #[actix_web::test]
    async fn break_without_shift_conflicts() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api").configure(routes::register_api)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/workers")
            .set_json(json!({
                "name": "Ana Brooks",
                "position": "Laborer",
                "hourly_rate": 19.0,
                "hire_date": "2025-04-01"
            }))
            .to_request();
        let worker: Value = test::call_and_read_body_json(&app, req).await;
        let id = worker["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/api/attendance/{id}/break-start"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/attendance/999/clock-in")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
