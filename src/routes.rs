use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;

use crate::api::{attendance, geofence, payroll, time_entry, worker};
use crate::error::{AppError, AppResult};

pub type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter refilling `requests_per_min` tokens a minute.
pub fn build_limiter(requests_per_min: u32) -> AppResult<LimiterConfig> {
    let per_min = requests_per_min.max(1);
    let per_ms = (60_000 / per_min as u64).max(1);

    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| AppError::Config(format!("invalid rate limit: {requests_per_min}/min")))
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limiter: &LimiterConfig) {
    cfg.service(
        web::scope(api_prefix)
            .wrap(Governor::new(limiter)) // rate limiting
            .configure(register_api),
    );
}

/// Every API resource, relative to the prefix scope.
pub fn register_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/workers")
            // /workers
            .service(
                web::resource("")
                    .route(web::post().to(worker::create_worker))
                    .route(web::get().to(worker::list_workers)),
            )
            // /workers/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(worker::get_worker))
                    .route(web::put().to(worker::update_worker)),
            )
            .service(
                web::resource("/{id}/location").route(web::post().to(worker::record_location)),
            )
            .service(
                web::resource("/{id}/locations").route(web::get().to(worker::location_history)),
            ),
    )
    .service(
        web::scope("/geofences")
            .service(web::resource("").route(web::get().to(geofence::list_zones)))
            .service(web::resource("/check").route(web::post().to(geofence::check_point))),
    )
    .service(
        web::scope("/attendance/{worker_id}")
            .service(web::resource("/clock-in").route(web::post().to(attendance::clock_in)))
            .service(web::resource("/clock-out").route(web::post().to(attendance::clock_out)))
            .service(web::resource("/break-start").route(web::post().to(attendance::break_start)))
            .service(web::resource("/break-end").route(web::post().to(attendance::break_end)))
            .service(
                web::resource("/travel-start").route(web::post().to(attendance::travel_start)),
            )
            .service(web::resource("/travel-end").route(web::post().to(attendance::travel_end))),
    )
    .service(
        web::scope("/time-entries")
            .service(web::resource("").route(web::get().to(time_entry::list_entries)))
            // registered before /{id}
            .service(web::resource("/active").route(web::get().to(time_entry::list_active)))
            .service(web::resource("/{id}").route(web::get().to(time_entry::get_entry)))
            .service(web::resource("/{id}/notes").route(web::put().to(time_entry::update_notes)))
            .service(
                web::resource("/{id}/approve").route(web::put().to(time_entry::approve_entry)),
            ),
    )
    .service(
        web::scope("/payroll")
            // /payroll
            .service(web::resource("").route(web::get().to(payroll::list_payrolls)))
            .service(web::resource("/process").route(web::post().to(payroll::process_payroll)))
            // /payroll/{id}
            .service(web::resource("/{id}").route(web::get().to(payroll::get_payroll)))
            .service(web::resource("/{id}/paid").route(web::put().to(payroll::mark_paid))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_zero() {
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(120_000).is_ok());
    }
}
