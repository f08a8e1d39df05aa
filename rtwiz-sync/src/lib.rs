//! rtwiz-sync library - field-to-group synchronization engine
//!
//! Normalizes a patient's treatment field rows and derives the automation
//! group rows from them, talking to the planning database through its
//! HTTP bridge.

use std::sync::Arc;

use axum::Router;
use rtwiz_common::config::TomlConfig;
use rtwiz_common::schema::{FieldTableSchema, GroupTableSchema};
use rtwiz_common::Result;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod assembler;
pub mod bridge;
pub mod locks;
pub mod normalizer;
pub mod orchestrator;
pub mod repo;
pub mod report;

use bridge::{DataStore, HttpBridge};
use orchestrator::SyncOrchestrator;
use repo::{BridgeFieldRepository, BridgeGroupRepository};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Bridge used for diagnostics endpoints
    pub store: Arc<dyn DataStore>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, store: Arc<dyn DataStore>) -> Self {
        Self {
            orchestrator,
            store,
        }
    }
}

/// Wire repositories and orchestrator over any data store
pub fn build_orchestrator(
    store: Arc<dyn DataStore>,
    config: &TomlConfig,
) -> Result<SyncOrchestrator> {
    let fields = BridgeFieldRepository::new(
        store.clone(),
        FieldTableSchema::from_config(&config.schema)?,
    );
    let groups = BridgeGroupRepository::new(store, GroupTableSchema::from_config(&config.schema)?);

    Ok(SyncOrchestrator::new(
        Arc::new(fields),
        Arc::new(groups),
        config.sync.failure_policy,
    ))
}

/// Build application state from configuration, using the HTTP bridge
pub fn state_from_config(config: &TomlConfig) -> Result<AppState> {
    let store: Arc<dyn DataStore> = Arc::new(HttpBridge::new(&config.bridge)?);
    let orchestrator = build_orchestrator(store.clone(), config)?;
    Ok(AppState::new(Arc::new(orchestrator), store))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/sync", post(api::post_sync))
        .route("/api/patients/:patient_id", get(api::get_patient))
        .route("/api/bridge/status", get(api::bridge_status))
        .route("/api/bridge/tables", get(api::bridge_tables))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
