//! Sync orchestrator
//!
//! Runs the field-to-group synchronization for one patient:
//!
//! `START → FETCH_FIELDS → NORMALIZE_EACH → REFETCH_FIELDS → ASSEMBLE_GROUPS
//! → PERSIST_GROUPS → DONE`, with `FAILED` reachable from every step.
//!
//! Steps run strictly in sequence: group assembly must see the field table
//! after normalization, so the fields are re-read rather than reused.

use crate::assembler::assemble_groups;
use crate::locks::PatientLocks;
use crate::normalizer::normalize_all;
use crate::repo::{FieldRepository, GroupRepository};
use crate::report::{RecordFailure, SyncReport};
use rtwiz_common::config::FailurePolicy;
use rtwiz_common::PatientId;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStage {
    Start,
    FetchFields,
    NormalizeEach,
    RefetchFields,
    AssembleGroups,
    PersistGroups,
    Done,
    Failed,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Start => "START",
            SyncStage::FetchFields => "FETCH_FIELDS",
            SyncStage::NormalizeEach => "NORMALIZE_EACH",
            SyncStage::RefetchFields => "REFETCH_FIELDS",
            SyncStage::AssembleGroups => "ASSEMBLE_GROUPS",
            SyncStage::PersistGroups => "PERSIST_GROUPS",
            SyncStage::Done => "DONE",
            SyncStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation: patient plus run flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub patient_id: PatientId,
    /// False: read both tables and report, write nothing
    pub run: bool,
    /// Overrides the orchestrator's configured policy
    pub policy: Option<FailurePolicy>,
}

impl SyncRequest {
    pub fn run(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            run: true,
            policy: None,
        }
    }

    pub fn preview(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            run: false,
            policy: None,
        }
    }
}

pub struct SyncOrchestrator {
    fields: Arc<dyn FieldRepository>,
    groups: Arc<dyn GroupRepository>,
    policy: FailurePolicy,
    locks: PatientLocks,
}

impl SyncOrchestrator {
    pub fn new(
        fields: Arc<dyn FieldRepository>,
        groups: Arc<dyn GroupRepository>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            fields,
            groups,
            policy,
            locks: PatientLocks::new(),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn locks(&self) -> &PatientLocks {
        &self.locks
    }

    /// Entry point for every invocation surface
    pub async fn execute(&self, request: SyncRequest) -> SyncReport {
        let policy = request.policy.unwrap_or(self.policy);
        let report = SyncReport::begin(request.patient_id, request.run, policy);
        let span = info_span!(
            "sync",
            run_id = %report.run_id,
            patient_id = %request.patient_id,
            run = request.run
        );

        async move {
            let report = if request.run {
                let _guard = self.locks.acquire(request.patient_id).await;
                self.synchronize(report).await
            } else {
                self.preview(report).await
            };
            info!(stage = %report.stage, outcome = ?report.outcome, "Sync finished");
            report
        }
        .instrument(span)
        .await
    }

    /// Read-only pass over both tables
    async fn preview(&self, mut report: SyncReport) -> SyncReport {
        let patient_id = report.patient_id;

        report.enter(SyncStage::FetchFields);
        match self.fields.fetch_fields(patient_id).await {
            Ok(fields) => report.fields = fields,
            Err(e) => return report.fail(&e),
        }

        match self.groups.fetch_groups(patient_id).await {
            Ok(groups) => report.group_table = groups,
            Err(e) => report.warn(format!("could not read group table: {}", e)),
        }

        report.preview()
    }

    /// Full run of the state machine; the caller holds the patient lock
    async fn synchronize(&self, mut report: SyncReport) -> SyncReport {
        let patient_id = report.patient_id;
        let policy = report.policy;

        // FETCH_FIELDS
        report.enter(SyncStage::FetchFields);
        let fields = match self.fields.fetch_fields(patient_id).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "Field fetch failed");
                return report.fail(&e);
            }
        };
        if fields.is_empty() {
            info!("No field records for patient");
            return report.no_records();
        }
        info!(fields = fields.len(), "Fetched field records");

        self.warn_on_existing_groups(&mut report).await;

        // NORMALIZE_EACH
        report.enter(SyncStage::NormalizeEach);
        let normalized = normalize_all(self.fields.as_ref(), &fields, policy).await;
        report.operations += normalized.updated + normalized.failures.len();
        report.failures.extend(normalized.failures);
        if normalized.aborted {
            if let Some(first) = report.failures.first().cloned() {
                return report.fail_on_record(&first);
            }
        }
        info!(
            updated = normalized.updated,
            failed = report.failures.len(),
            "Normalized field records"
        );

        // REFETCH_FIELDS
        report.enter(SyncStage::RefetchFields);
        let fields = match self.fields.fetch_fields(patient_id).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "Field re-fetch failed");
                return report.fail(&e);
            }
        };
        if fields.is_empty() {
            // Rows vanished between the two reads
            return report.no_records();
        }

        // ASSEMBLE_GROUPS
        report.enter(SyncStage::AssembleGroups);
        let groups = assemble_groups(&fields);
        report.fields = fields;
        info!(groups = groups.len(), "Assembled group records");

        if policy == FailurePolicy::SkipGroupsOnError && !report.failures.is_empty() {
            warn!(
                failed = report.failures.len(),
                "Skipping group persistence after normalization failures"
            );
            report.warn(format!(
                "group persistence skipped: {} field update(s) failed",
                report.failures.len()
            ));
            report.groups_assembled = groups;
            return report.complete();
        }

        // PERSIST_GROUPS
        report.enter(SyncStage::PersistGroups);
        for group in &groups {
            report.operations += 1;
            match self.groups.insert(group).await {
                Ok(()) => report.groups_inserted += 1,
                Err(e) => {
                    warn!(field = %group.key(), error = %e, "Group insert failed");
                    let failure = RecordFailure::new(SyncStage::PersistGroups, group.key(), &e);
                    report.failures.push(failure.clone());
                    if policy == FailurePolicy::FailFast {
                        report.groups_assembled = groups;
                        return report.fail_on_record(&failure);
                    }
                }
            }
        }
        info!(inserted = report.groups_inserted, "Persisted group records");
        report.groups_assembled = groups;

        match self.groups.fetch_groups(patient_id).await {
            Ok(stored) => report.group_table = stored,
            Err(e) => {
                warn!(error = %e, "Group read-back failed");
                report.warn(format!("could not read back group table: {}", e));
            }
        }

        report.complete()
    }

    /// Re-runs append; make that visible
    async fn warn_on_existing_groups(&self, report: &mut SyncReport) {
        match self.groups.fetch_groups(report.patient_id).await {
            Ok(existing) if !existing.is_empty() => {
                warn!(
                    existing = existing.len(),
                    "Group table already holds rows for patient; new rows will be appended"
                );
                report.warn(format!(
                    "group table already held {} row(s) for this patient; new rows were appended",
                    existing.len()
                ));
            }
            Ok(_) => {}
            Err(e) => report.warn(format!("could not check existing group rows: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{InMemoryFieldTable, InMemoryGroupTable};
    use crate::report::SyncOutcome;
    use rtwiz_common::{FieldRecord, SqlValue};

    fn field(site_id: i64, field_id: &str, accessory: &str) -> FieldRecord {
        FieldRecord {
            patient_id: PatientId::new(1).unwrap(),
            plan_id: 1,
            site_id,
            field_id: field_id.to_string(),
            field_name: String::new(),
            position: SqlValue::Text("2".to_string()),
            accessory: Some(accessory.to_string()),
            machine_id: None,
            dose_rate: None,
            slot1: None,
            slot2: None,
            comment: None,
        }
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [SyncStage::Start, SyncStage::NormalizeEach, SyncStage::Failed] {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, stage.to_string());
        }
    }

    #[tokio::test]
    async fn test_groups_derive_from_refetched_fields() {
        let fields = Arc::new(InMemoryFieldTable::new(vec![
            field(1, "1", "EA-5"),
            field(1, "2_1", "STD"),
        ]));
        let groups = Arc::new(InMemoryGroupTable::new());
        let orchestrator =
            SyncOrchestrator::new(fields.clone(), groups.clone(), FailurePolicy::BestEffort);

        let report = orchestrator
            .execute(SyncRequest::run(PatientId::new(1).unwrap()))
            .await;

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.stage, SyncStage::Done);
        assert_eq!(fields.fetch_count(), 2);
        assert_eq!(report.fields[0].slot1.as_deref(), Some("EA-5"));
        assert_eq!(report.fields[1].comment.as_deref(), Some("ATAUALIZADO"));
        assert_eq!(groups.rows().await.len(), 2);
        assert!(!orchestrator.locks().is_locked(PatientId::new(1).unwrap()));
    }
}
