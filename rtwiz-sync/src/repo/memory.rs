//! In-memory field and group tables
//!
//! Behave like the bridge-backed repositories (ordering, identity-keyed
//! updates, unconditional inserts) and allow failures to be injected per
//! field id.

use super::{FieldRepository, GroupRepository};
use async_trait::async_trait;
use rtwiz_common::{Error, FieldRecord, GroupRecord, PatientId, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryFieldTable {
    rows: Mutex<Vec<FieldRecord>>,
    failing_updates: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    /// 1-based fetch call that fails; 0 disables
    failing_fetch: AtomicUsize,
    fetches: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryFieldTable {
    pub fn new(rows: Vec<FieldRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Make updates of the given field id fail with a query error
    pub async fn fail_updates_for(&self, field_id: &str) {
        self.failing_updates.lock().await.insert(field_id.to_string());
    }

    /// Make the `n`th fetch (1-based) fail with a connection error
    pub fn fail_fetch_number(&self, n: usize) {
        self.failing_fetch.store(n, Ordering::SeqCst);
    }

    /// Make every call fail with a connection error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn rows(&self) -> Vec<FieldRecord> {
        self.rows.lock().await.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("in-memory store marked unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FieldRepository for InMemoryFieldTable {
    async fn fetch_fields(&self, patient_id: PatientId) -> Result<Vec<FieldRecord>> {
        self.check_reachable()?;
        let fetch_number = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_fetch.load(Ordering::SeqCst) == fetch_number {
            return Err(Error::Connection(format!(
                "injected failure on fetch {}",
                fetch_number
            )));
        }

        let mut rows: Vec<FieldRecord> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.site_id, &a.field_id, &a.field_name).cmp(&(b.site_id, &b.field_id, &b.field_name))
        });
        Ok(rows)
    }

    async fn update_accessory_slots(&self, record: &FieldRecord) -> Result<()> {
        self.check_reachable()?;
        self.updates.fetch_add(1, Ordering::SeqCst);

        if self.failing_updates.lock().await.contains(&record.field_id) {
            return Err(Error::Query(format!(
                "injected update failure for field {}",
                record.field_id
            )));
        }

        let key = record.key();
        let mut rows = self.rows.lock().await;
        let mut matched = 0;
        for row in rows.iter_mut().filter(|r| r.key() == key) {
            row.machine_id = record.machine_id.clone();
            row.dose_rate = record.dose_rate.clone();
            row.slot1 = record.slot1.clone();
            row.slot2 = record.slot2.clone();
            row.comment = record.comment.clone();
            matched += 1;
        }

        if matched == 0 {
            return Err(Error::Query(format!("no field row matches {}", key)));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGroupTable {
    rows: Mutex<Vec<GroupRecord>>,
    failing_inserts: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
}

impl InMemoryGroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserts for the given field id fail with a query error
    pub async fn fail_inserts_for(&self, field_id: &str) {
        self.failing_inserts.lock().await.insert(field_id.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn rows(&self) -> Vec<GroupRecord> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl GroupRepository for InMemoryGroupTable {
    async fn insert(&self, record: &GroupRecord) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("in-memory store marked unreachable".to_string()));
        }
        if self.failing_inserts.lock().await.contains(&record.field_id) {
            return Err(Error::Query(format!(
                "injected insert failure for field {}",
                record.field_id
            )));
        }
        self.rows.lock().await.push(record.clone());
        Ok(())
    }

    async fn fetch_groups(&self, patient_id: PatientId) -> Result<Vec<GroupRecord>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("in-memory store marked unreachable".to_string()));
        }
        let mut rows: Vec<GroupRecord> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.field_order);
        Ok(rows)
    }
}
