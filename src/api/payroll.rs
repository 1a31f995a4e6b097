use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::payroll::{PaginatedPayrollResponse, PayPeriod, PayrollQuery, PayrollRecord};
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct ProcessPayrollResponse {
    #[schema(example = 3)]
    pub created: usize,
    pub records: Vec<PayrollRecord>,
}

/// Run payroll for a pay period
///
/// Completed time entries in the period are summed per worker and become
/// draft payroll records; the entries are approved in the same transaction.
#[utoipa::path(
    post,
    path = "/api/payroll/process",
    request_body = PayPeriod,
    responses(
        (status = 201, description = "Payroll batch created", body = ProcessPayrollResponse),
        (status = 400, description = "Start after end"),
        (status = 409, description = "Entries changed during processing")
    ),
    tag = "Payroll"
)]
pub async fn process_payroll(
    state: web::Data<AppState>,
    payload: web::Json<PayPeriod>,
) -> actix_web::Result<impl Responder> {
    let records = state
        .payroll
        .process_period(payload.start, payload.end)
        .await?;

    Ok(HttpResponse::Created().json(ProcessPayrollResponse {
        created: records.len(),
        records,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = PayrollRecord),
        (status = 404)
    ),
    tag = "Payroll"
)]
pub async fn get_payroll(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(state.payroll.get(path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse)
    ),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    state: web::Data<AppState>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

    let (data, total) = state.payroll.list(query.worker_id, page, per_page).await?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/paid",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll marked paid", body = PayrollRecord),
        (status = 404),
        (status = 409, description = "Already paid")
    ),
    tag = "Payroll"
)]
pub async fn mark_paid(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(state.payroll.mark_paid(path.into_inner()).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test, web};
    use chrono::Duration;
    use serde_json::{Value, json};

    use crate::routes;
    use crate::state::testing::test_state;

    #[actix_web::test]
    async fn process_then_rerun_over_http() {
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
                "name": "Rosa Lindqvist",
                "position": "Roller Operator",
                "hourly_rate": 20.0,
                "hire_date": "2024-06-01"
            }))
            .to_request();
        let worker: Value = test::call_and_read_body_json(&app, req).await;
        let id = worker["id"].as_i64().unwrap();

        for _ in 0..5 {
            let req = test::TestRequest::post()
                .uri(&format!("/api/attendance/{id}/clock-in"))
                .to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
            clock.advance(Duration::hours(9));
            let req = test::TestRequest::post()
                .uri(&format!("/api/attendance/{id}/clock-out"))
                .to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
            clock.advance(Duration::hours(15));
        }

        let period = json!({ "start": "2026-05-04", "end": "2026-05-10" });
        let req = test::TestRequest::post()
            .uri("/api/payroll/process")
            .set_json(&period)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["created"], 1);
        assert_eq!(body["records"][0]["regular_hours"], 40.0);
        assert_eq!(body["records"][0]["overtime_hours"], 5.0);
        assert_eq!(body["records"][0]["gross_pay"], 950.0);

        let req = test::TestRequest::post()
            .uri("/api/payroll/process")
            .set_json(&period)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["created"], 0);

        let req = test::TestRequest::get()
            .uri(&format!("/api/payroll?worker_id={id}"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
    }

    #[actix_web::test]
    async fn inverted_period_is_bad_request() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api").configure(routes::register_api)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/payroll/process")
            .set_json(json!({ "start": "2026-05-10", "end": "2026-05-04" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
