//! SMSGROUP table through the bridge

use super::GroupRepository;
use crate::bridge::DataStore;
use async_trait::async_trait;
use rtwiz_common::schema::{self, GroupTableSchema, GROUP_COLUMNS};
use rtwiz_common::sql::Statement;
use rtwiz_common::{GroupRecord, PatientId, Result};
use std::sync::Arc;
use tracing::debug;

pub struct BridgeGroupRepository {
    store: Arc<dyn DataStore>,
    schema: GroupTableSchema,
}

impl BridgeGroupRepository {
    pub fn new(store: Arc<dyn DataStore>, schema: GroupTableSchema) -> Self {
        Self { store, schema }
    }

    pub fn insert_statement(&self, record: &GroupRecord) -> Statement {
        let placeholders = vec!["?"; GROUP_COLUMNS.len()].join(", ");
        let template = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.schema.table,
            GROUP_COLUMNS.join(", "),
            placeholders
        );

        GroupTableSchema::insert_values(record)
            .into_iter()
            .fold(Statement::new(template), |stmt, value| stmt.bind(value))
    }

    pub fn fetch_statement(&self, patient_id: PatientId) -> Statement {
        Statement::new(format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {} ASC",
            self.schema.table,
            schema::PATIENT_ID,
            schema::FIELDORDER
        ))
        .bind(patient_id)
    }
}

#[async_trait]
impl GroupRepository for BridgeGroupRepository {
    async fn insert(&self, record: &GroupRecord) -> Result<()> {
        let sql = self.insert_statement(record).render()?;
        self.store.query(&sql).await?;
        debug!(
            field_id = %record.field_id,
            group = %record.group_name,
            field_order = record.field_order,
            "Inserted group row"
        );
        Ok(())
    }

    async fn fetch_groups(&self, patient_id: PatientId) -> Result<Vec<GroupRecord>> {
        let sql = self.fetch_statement(patient_id).render()?;
        let rows = self.store.query(&sql).await?;
        rows.iter().map(|row| self.schema.parse_row(row)).collect()
    }
}
