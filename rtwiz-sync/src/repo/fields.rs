//! FIELD table through the bridge

use super::FieldRepository;
use crate::bridge::DataStore;
use async_trait::async_trait;
use rtwiz_common::models::SqlValue;
use rtwiz_common::schema::{self, FieldTableSchema};
use rtwiz_common::sql::Statement;
use rtwiz_common::{FieldRecord, PatientId, Result};
use std::sync::Arc;
use tracing::debug;

pub struct BridgeFieldRepository {
    store: Arc<dyn DataStore>,
    schema: FieldTableSchema,
}

impl BridgeFieldRepository {
    pub fn new(store: Arc<dyn DataStore>, schema: FieldTableSchema) -> Self {
        Self { store, schema }
    }

    pub fn fetch_statement(&self, patient_id: PatientId) -> Statement {
        Statement::new(format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}, {}, {} ASC",
            self.schema.table,
            schema::PATIENT_ID,
            schema::SITE_ID,
            schema::FIELD_ID,
            schema::FIELD_NAME
        ))
        .bind(patient_id)
    }

    pub fn update_statement(&self, record: &FieldRecord) -> Statement {
        Statement::new(format!(
            "UPDATE {} SET {} = ?, {} = ?, {} = ?, {} = ?, {} = ? \
             WHERE {} = ? AND {} = ? AND {} = ? AND {} = ?",
            self.schema.table,
            schema::MACHINE_ID,
            schema::DOSERATE,
            schema::SLOT1,
            schema::SLOT2,
            schema::COMMENT,
            schema::PATIENT_ID,
            schema::PLAN_ID,
            schema::SITE_ID,
            schema::FIELD_ID
        ))
        .bind(padded(record.machine_id.as_deref()))
        .bind(padded(record.dose_rate.as_deref()))
        .bind(padded(record.slot1.as_deref()))
        .bind(padded(record.slot2.as_deref()))
        .bind(padded(record.comment.as_deref()))
        .bind(record.patient_id)
        .bind(record.plan_id)
        .bind(record.site_id)
        .bind(record.field_id.as_str())
    }
}

/// The store rejects zero-length strings in these columns; empty is
/// written as a single space
fn padded(value: Option<&str>) -> SqlValue {
    match value {
        Some(v) if !v.is_empty() => SqlValue::Text(v.to_string()),
        _ => SqlValue::Text(" ".to_string()),
    }
}

#[async_trait]
impl FieldRepository for BridgeFieldRepository {
    async fn fetch_fields(&self, patient_id: PatientId) -> Result<Vec<FieldRecord>> {
        let sql = self.fetch_statement(patient_id).render()?;
        let rows = self.store.query(&sql).await?;
        debug!(patient_id = %patient_id, rows = rows.len(), "Fetched field rows");

        rows.iter().map(|row| self.schema.parse_row(row)).collect()
    }

    async fn update_accessory_slots(&self, record: &FieldRecord) -> Result<()> {
        let sql = self.update_statement(record).render()?;
        self.store.query(&sql).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtwiz_common::config::SchemaConfig;

    struct NoStore;

    #[async_trait]
    impl DataStore for NoStore {
        async fn test(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn query(&self, _sql: &str) -> Result<Vec<rtwiz_common::schema::JsonRow>> {
            Ok(Vec::new())
        }
        async fn tables(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn repo() -> BridgeFieldRepository {
        let schema = FieldTableSchema::from_config(&SchemaConfig::default()).unwrap();
        BridgeFieldRepository::new(Arc::new(NoStore), schema)
    }

    fn record(field_id: &str) -> FieldRecord {
        FieldRecord {
            patient_id: PatientId::new(1001).unwrap(),
            plan_id: 2,
            site_id: 3,
            field_id: field_id.to_string(),
            field_name: "AP".to_string(),
            position: SqlValue::Integer(1),
            accessory: Some("EA-5".to_string()),
            machine_id: Some("0".to_string()),
            dose_rate: Some("0".to_string()),
            slot1: Some("EA-5".to_string()),
            slot2: Some(String::new()),
            comment: Some("ATAUALIZADO".to_string()),
        }
    }

    #[test]
    fn test_fetch_statement_orders_by_site_field_name() {
        let sql = repo()
            .fetch_statement(PatientId::new(1001).unwrap())
            .render()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM FIELD WHERE PATIENT_ID = 1001 ORDER BY SITE_ID, FIELD_ID, FIELD_NAME ASC"
        );
    }

    #[test]
    fn test_update_statement_keys_on_identity_tuple() {
        let sql = repo().update_statement(&record("12_3")).render().unwrap();
        assert_eq!(
            sql,
            "UPDATE FIELD SET MACHINE_ID = '0', DOSERATE = '0', SLOT1 = 'EA-5', SLOT2 = ' ', \
             COMMENT = 'ATAUALIZADO' WHERE PATIENT_ID = 1001 AND PLAN_ID = 2 AND SITE_ID = 3 \
             AND FIELD_ID = '12_3'"
        );
    }

    #[test]
    fn test_update_statement_escapes_field_id() {
        let sql = repo().update_statement(&record("1' OR '1'='1")).render().unwrap();
        assert!(sql.ends_with("FIELD_ID = '1'' OR ''1''=''1'"));
    }
}
