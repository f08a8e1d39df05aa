//! HTTP API handlers for rtwiz-sync

pub mod bridge;
pub mod error;
pub mod health;
pub mod sync;

pub use bridge::{bridge_status, bridge_tables};
pub use error::ApiError;
pub use health::health_routes;
pub use sync::{get_patient, post_sync};
