//! Sync run report
//!
//! Everything a run produced, in one value: the field rows as normalized,
//! the group rows assembled and read back, and every per-record failure.
//! Serialized as JSON for the HTTP API and rendered as plain text tables
//! for the CLI.

use crate::orchestrator::SyncStage;
use chrono::{DateTime, Utc};
use rtwiz_common::config::FailurePolicy;
use rtwiz_common::{Error, FieldKey, FieldRecord, GroupRecord, PatientId, Result};
use serde::Serialize;
use std::fmt::Write as _;
use uuid::Uuid;

/// Error category carried through reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connection,
    Query,
    Malformed,
    Validation,
    Other,
}

impl FailureKind {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::Connection(_) => FailureKind::Connection,
            Error::Query(_) => FailureKind::Query,
            Error::MalformedResponse(_) => FailureKind::Malformed,
            Error::Validation(_) => FailureKind::Validation,
            _ => FailureKind::Other,
        }
    }

    /// Rebuild an error of this kind around a message
    pub fn into_error(self, message: String) -> Error {
        match self {
            FailureKind::Connection => Error::Connection(message),
            FailureKind::Query => Error::Query(message),
            FailureKind::Malformed => Error::MalformedResponse(message),
            FailureKind::Validation => Error::Validation(message),
            FailureKind::Other => Error::Query(message),
        }
    }
}

/// One failed per-record operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub stage: SyncStage,
    pub field: FieldKey,
    pub kind: FailureKind,
    pub message: String,
}

impl RecordFailure {
    pub fn new(stage: SyncStage, field: FieldKey, error: &Error) -> Self {
        Self {
            stage,
            field,
            kind: FailureKind::of(error),
            message: error.to_string(),
        }
    }
}

/// How the run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Still running (never observed in a returned report)
    Pending,
    /// Read-only run; nothing was written
    Preview,
    /// Patient has no field rows
    NoRecords,
    Completed,
    /// Some per-record operations failed while others succeeded
    PartialFailure { failed: usize, total: usize },
    Failed {
        stage: SyncStage,
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub patient_id: PatientId,
    /// Run flag: false for a preview
    pub run: bool,
    pub policy: FailurePolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Last stage entered
    pub stage: SyncStage,
    pub outcome: SyncOutcome,
    /// Field rows as re-read after normalization (as read, for a preview)
    pub fields: Vec<FieldRecord>,
    pub groups_assembled: Vec<GroupRecord>,
    pub groups_inserted: usize,
    /// Group rows stored for the patient after the run
    pub group_table: Vec<GroupRecord>,
    /// Number of per-record operations attempted
    pub operations: usize,
    pub failures: Vec<RecordFailure>,
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn begin(patient_id: PatientId, run: bool, policy: FailurePolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            patient_id,
            run,
            policy,
            started_at: Utc::now(),
            finished_at: None,
            stage: SyncStage::Start,
            outcome: SyncOutcome::Pending,
            fields: Vec::new(),
            groups_assembled: Vec::new(),
            groups_inserted: 0,
            group_table: Vec::new(),
            operations: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn enter(&mut self, stage: SyncStage) {
        self.stage = stage;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// End the run in FAILED at the current stage
    pub fn fail(mut self, error: &Error) -> Self {
        self.outcome = SyncOutcome::Failed {
            stage: self.stage,
            kind: FailureKind::of(error),
            message: error.to_string(),
        };
        self.finish_at(SyncStage::Failed)
    }

    /// End the run in FAILED because of a per-record failure
    pub fn fail_on_record(mut self, failure: &RecordFailure) -> Self {
        self.outcome = SyncOutcome::Failed {
            stage: failure.stage,
            kind: failure.kind,
            message: format!("{}: {}", failure.field, failure.message),
        };
        self.finish_at(SyncStage::Failed)
    }

    pub fn no_records(mut self) -> Self {
        self.outcome = SyncOutcome::NoRecords;
        self.finish_at(SyncStage::Done)
    }

    pub fn preview(mut self) -> Self {
        self.outcome = if self.fields.is_empty() {
            SyncOutcome::NoRecords
        } else {
            SyncOutcome::Preview
        };
        self.finish_at(SyncStage::Done)
    }

    /// End a full run at DONE, or at FAILED when no per-record operation
    /// succeeded
    pub fn complete(mut self) -> Self {
        let failed = self.failures.len();
        if failed == 0 {
            self.outcome = SyncOutcome::Completed;
            return self.finish_at(SyncStage::Done);
        }

        if failed >= self.operations {
            let first = &self.failures[0];
            self.outcome = SyncOutcome::Failed {
                stage: first.stage,
                kind: first.kind,
                message: format!(
                    "all {} record operations failed, first at {}: {}",
                    failed, first.field, first.message
                ),
            };
            return self.finish_at(SyncStage::Failed);
        }

        self.outcome = SyncOutcome::PartialFailure {
            failed,
            total: self.operations,
        };
        self.finish_at(SyncStage::Done)
    }

    fn finish_at(mut self, stage: SyncStage) -> Self {
        self.stage = stage;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            SyncOutcome::Completed | SyncOutcome::NoRecords | SyncOutcome::Preview
        )
    }

    /// Convert a non-successful outcome into the matching error
    pub fn into_result(self) -> Result<Self> {
        match &self.outcome {
            SyncOutcome::PartialFailure { failed, total } => Err(Error::PartialFailure {
                failed: *failed,
                total: *total,
            }),
            SyncOutcome::Failed { kind, message, .. } => Err(kind.into_error(message.clone())),
            _ => Ok(self),
        }
    }

    /// Plain text summary of both tables followed by any errors
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mode = if self.run { "run" } else { "preview" };
        let _ = writeln!(
            out,
            "Patient {} [{}] run {} policy {}: {}",
            self.patient_id,
            mode,
            self.run_id,
            self.policy,
            outcome_label(&self.outcome)
        );

        if matches!(self.outcome, SyncOutcome::NoRecords) {
            let _ = writeln!(out, "No records found for patient {}.", self.patient_id);
        }

        if !self.fields.is_empty() {
            let _ = writeln!(out, "\nTable FIELD ({} rows)", self.fields.len());
            out.push_str(&render_table(&FIELD_HEADERS, self.fields.iter().map(field_cells)));
        }

        if self.run && !self.groups_assembled.is_empty() {
            let _ = writeln!(
                out,
                "\nGroups assembled: {} (inserted {})",
                self.groups_assembled.len(),
                self.groups_inserted
            );
        }

        let _ = writeln!(out, "\nTable SMSGROUP ({} rows)", self.group_table.len());
        if self.group_table.is_empty() {
            let _ = writeln!(out, "No records found.");
        } else {
            out.push_str(&render_table(&GROUP_HEADERS, self.group_table.iter().map(group_cells)));
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "  {}", warning);
            }
        }

        if !self.failures.is_empty() || matches!(self.outcome, SyncOutcome::Failed { .. }) {
            let _ = writeln!(out, "\nErrors:");
            for failure in &self.failures {
                let _ = writeln!(
                    out,
                    "  [{}] {}: {}",
                    failure.stage, failure.field, failure.message
                );
            }
            if let SyncOutcome::Failed { stage, message, .. } = &self.outcome {
                let _ = writeln!(out, "  [{}] run failed: {}", stage, message);
            }
        }

        out
    }
}

const FIELD_HEADERS: [&str; 12] = [
    "PATIENT_ID",
    "PLAN_ID",
    "SITE_ID",
    "FIELD_ID",
    "FIELD_NAME",
    "POSITION",
    "ACCESSORY",
    "MACHINE_ID",
    "DOSERATE",
    "SLOT1",
    "SLOT2",
    "COMMENT",
];

const GROUP_HEADERS: [&str; 10] = [
    "FIELDORDER",
    "PLAN_ID",
    "SITE_ID",
    "FIELD_ID",
    "GROUPNAME",
    "SUBGROUP",
    "POSITION",
    "SUBPOSITION",
    "ISIMGROUP",
    "MLC_TOLERANCE",
];

fn outcome_label(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Pending => "PENDING".to_string(),
        SyncOutcome::Preview => "PREVIEW".to_string(),
        SyncOutcome::NoRecords => "NO RECORDS".to_string(),
        SyncOutcome::Completed => "COMPLETED".to_string(),
        SyncOutcome::PartialFailure { failed, total } => {
            format!("PARTIAL FAILURE ({} of {} operations failed)", failed, total)
        }
        SyncOutcome::Failed { stage, .. } => format!("FAILED at {}", stage),
    }
}

fn field_cells(f: &FieldRecord) -> Vec<String> {
    vec![
        f.patient_id.to_string(),
        f.plan_id.to_string(),
        f.site_id.to_string(),
        f.field_id.clone(),
        f.field_name.clone(),
        f.position.to_string(),
        f.accessory.clone().unwrap_or_default(),
        f.machine_id.clone().unwrap_or_default(),
        f.dose_rate.clone().unwrap_or_default(),
        f.slot1.clone().unwrap_or_default(),
        f.slot2.clone().unwrap_or_default(),
        f.comment.clone().unwrap_or_default(),
    ]
}

fn group_cells(g: &GroupRecord) -> Vec<String> {
    vec![
        g.field_order.to_string(),
        g.plan_id.to_string(),
        g.site_id.to_string(),
        g.field_id.clone(),
        g.group_name.clone(),
        g.sub_group.clone(),
        g.position.to_string(),
        g.sub_position.clone(),
        g.is_im_group.to_string(),
        g.mlc_tolerance.clone(),
    ]
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    format!("| {} |\n", padded.join(" | "))
}

/// Fixed-width text table
fn render_table(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let rows: Vec<Vec<String>> = rows.collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = table_line(headers.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("|-{}-|\n", rule.join("-|-")));
    for row in &rows {
        out.push_str(&table_line(row.iter().map(String::as_str), &widths));
    }
    out
}
