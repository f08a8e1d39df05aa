//! Field and group table access
//!
//! The orchestrator only sees these traits. Bridge-backed implementations
//! build literal SQL through `rtwiz_common::sql::Statement`; the in-memory
//! implementations back tests and dry runs.

use async_trait::async_trait;
use rtwiz_common::{FieldRecord, GroupRecord, PatientId, Result};

mod fields;
mod groups;
pub mod memory;

pub use fields::BridgeFieldRepository;
pub use groups::BridgeGroupRepository;
pub use memory::{InMemoryFieldTable, InMemoryGroupTable};

/// Reads and updates flat field records
#[async_trait]
pub trait FieldRepository: Send + Sync {
    /// All field rows of a patient ordered by (site, field id, field name).
    /// No rows is an empty vector, not an error.
    async fn fetch_fields(&self, patient_id: PatientId) -> Result<Vec<FieldRecord>>;

    /// Persist machine/dose-rate/slot/comment columns for the record's
    /// exact identity tuple
    async fn update_accessory_slots(&self, record: &FieldRecord) -> Result<()>;
}

/// Inserts and reads derived group records
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Unconditional insert of one row (no upsert, no existence check)
    async fn insert(&self, record: &GroupRecord) -> Result<()>;

    /// Group rows currently stored for a patient, by field order
    async fn fetch_groups(&self, patient_id: PatientId) -> Result<Vec<GroupRecord>>;
}
