use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::watch;

mod api;
mod config;
mod db;
mod docs;
mod error;
mod geo;
mod model;
mod routes;
mod service;
mod state;
mod store;
mod utils;

use config::Config;
use db::init_store;

use crate::geo::geofence::{DEFAULT_ZONES, load_zones};
use crate::service::clock::SystemClock;
use crate::service::monitor::GeofenceMonitor;
use crate::state::AppState;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa_swagger_ui::SwaggerUi;

const CACHE_WARMUP_BATCH: usize = 250;

#[get("/health")]
async fn health(state: Data<AppState>) -> actix_web::Result<impl Responder> {
    state.repo.health_check().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "paveops.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let repo = init_store(&config).await?;

    let zones = match &config.zones_path {
        Some(path) => load_zones(path)?,
        None => DEFAULT_ZONES.to_vec(),
    };
    info!(zones = zones.len(), "Geofence zones loaded");

    let state = AppState::build(&config, repo, Arc::new(SystemClock), zones);
    let limiter = routes::build_limiter(config.rate_protected_per_min)?;

    let cache = state.location_cache.clone();
    let repo_for_warmup = state.repo.clone();
    let clock_for_warmup = state.clock.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = cache
            .warmup(repo_for_warmup.as_ref(), clock_for_warmup.as_ref(), CACHE_WARMUP_BATCH)
            .await
        {
            error!(error = %e, "Failed to warm up location cache");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = GeofenceMonitor::new(
        state.attendance.clone(),
        state.repo.clone(),
        state.location_cache.clone(),
        config.geofence_poll,
    );
    let monitor_handle = actix_web::rt::spawn(monitor.run(shutdown_rx));

    let server_addr = config.server_addr.clone();
    let api_prefix = config.api_prefix.clone();
    let openapi = docs::openapi_for(&api_prefix);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
            .app_data(Data::new(state.clone()))
            .service(health)
            .configure(|cfg| routes::configure(cfg, &api_prefix, &limiter))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    info!("Server stopped, shutting down geofence monitor");
    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor_handle.await {
        error!(error = %e, "Geofence monitor task failed");
    }

    Ok(())
}
