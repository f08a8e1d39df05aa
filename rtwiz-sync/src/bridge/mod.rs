//! Remote database bridge
//!
//! The legacy store is only reachable through a small HTTP service that
//! takes an action name plus optional SQL text and answers with JSON.
//! `DataStore` is the seam the repositories depend on; `HttpBridge` is the
//! production implementation.

use async_trait::async_trait;
use rtwiz_common::schema::JsonRow;
use rtwiz_common::Result;

mod client;
pub mod protocol;

pub use client::HttpBridge;
pub use protocol::{BridgeAction, BridgeReply};

/// Request/response access to the legacy store
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Connectivity probe; returns the bridge's status message
    async fn test(&self) -> Result<String>;

    /// Execute one SQL statement; statements without a result set yield
    /// no rows
    async fn query(&self, sql: &str) -> Result<Vec<JsonRow>>;

    /// Names of the user tables in the store
    async fn tables(&self) -> Result<Vec<String>>;
}
