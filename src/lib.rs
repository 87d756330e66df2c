//! Shop-floor batch tracking API.
//!
//! Tracks production batches from machine to warehouse to QC as a lineage
//! forest, reconciles operator-reported against recounted quantities, keeps
//! per-setup quantity adjustments consistent, and arbitrates the fixed pool
//! of physical tracking cards each machine hands out.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// All domain routes, mounted under /api/v1.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/batches", handlers::batches::batches_router())
        .nest("/machines", handlers::cards::cards_router())
        .nest("/lots", handlers::lots::lots_router())
        .nest("/setups", handlers::setups::setups_router())
}

/// The full application router: health probes, the v1 API, the OpenAPI
/// document, and the ambient HTTP layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
