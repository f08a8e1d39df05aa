//! Accessory normalizer
//!
//! Decides delivery-machine defaults for a field from its accessory
//! descriptor. Descriptors mentioning a virtual wedge (`VW`) or an
//! electron applicator (`EA`) keep the descriptor in slot 1; everything
//! else gets empty slots.

use crate::orchestrator::SyncStage;
use crate::repo::FieldRepository;
use crate::report::RecordFailure;
use rtwiz_common::config::FailurePolicy;
use rtwiz_common::FieldRecord;
use serde::Serialize;
use tracing::{debug, warn};

/// Comment stamped on every normalized field row
pub const NORMALIZED_COMMENT: &str = "ATAUALIZADO";

/// Descriptor substrings that keep the accessory in slot 1
const SLOT_MARKERS: [&str; 2] = ["VW", "EA"];

/// Normalized machine/slot values for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAssignment {
    pub machine_id: String,
    pub dose_rate: String,
    pub slot1: String,
    pub slot2: String,
    pub comment: String,
}

impl SlotAssignment {
    /// Pure rule; an absent descriptor is treated like one without markers
    pub fn for_descriptor(descriptor: Option<&str>) -> Self {
        let slot1 = match descriptor {
            Some(d) if SLOT_MARKERS.iter().any(|m| d.contains(m)) => d.to_string(),
            _ => String::new(),
        };

        Self {
            machine_id: "0".to_string(),
            dose_rate: "0".to_string(),
            slot1,
            slot2: String::new(),
            comment: NORMALIZED_COMMENT.to_string(),
        }
    }

    /// Copy of `record` with the assignment applied
    pub fn apply_to(&self, record: &FieldRecord) -> FieldRecord {
        FieldRecord {
            machine_id: Some(self.machine_id.clone()),
            dose_rate: Some(self.dose_rate.clone()),
            slot1: Some(self.slot1.clone()),
            slot2: Some(self.slot2.clone()),
            comment: Some(self.comment.clone()),
            ..record.clone()
        }
    }
}

/// Normalize one record (no I/O)
pub fn normalize(record: &FieldRecord) -> FieldRecord {
    SlotAssignment::for_descriptor(record.accessory.as_deref()).apply_to(record)
}

/// Result of normalizing a batch
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub updated: usize,
    pub failures: Vec<RecordFailure>,
    /// Set when `FailFast` stopped the batch early
    pub aborted: bool,
}

/// Write normalized slots for every record through the repository
///
/// Every record is attempted unless the policy is `FailFast`, which stops
/// at the first failure.
pub async fn normalize_all(
    repo: &dyn FieldRepository,
    records: &[FieldRecord],
    policy: FailurePolicy,
) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    for record in records {
        let normalized = normalize(record);
        match repo.update_accessory_slots(&normalized).await {
            Ok(()) => {
                debug!(
                    field_id = %record.field_id,
                    slot1 = %normalized.slot1.as_deref().unwrap_or_default(),
                    "Normalized field"
                );
                outcome.updated += 1;
            }
            Err(e) => {
                warn!(field = %record.key(), error = %e, "Field normalization failed");
                outcome
                    .failures
                    .push(RecordFailure::new(SyncStage::NormalizeEach, record.key(), &e));
                if policy == FailurePolicy::FailFast {
                    outcome.aborted = true;
                    break;
                }
            }
        }
    }

    outcome
}
