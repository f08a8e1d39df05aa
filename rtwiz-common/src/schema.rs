//! Table schema declarations
//!
//! Single source of truth for the column names this crate reads and writes
//! in the legacy store, and for turning the bridge's name-keyed JSON rows
//! into typed records. Rows are converted exactly once, here.

use crate::config::SchemaConfig;
use crate::models::{FieldRecord, GroupRecord, PatientId, SqlValue};
use crate::sql::validate_identifier;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// A row as returned by the bridge: column name to JSON cell
pub type JsonRow = Map<String, Value>;

pub const PATIENT_ID: &str = "PATIENT_ID";
pub const PLAN_ID: &str = "PLAN_ID";
pub const SITE_ID: &str = "SITE_ID";
pub const FIELD_ID: &str = "FIELD_ID";
pub const FIELD_NAME: &str = "FIELD_NAME";
pub const MACHINE_ID: &str = "MACHINE_ID";
pub const DOSERATE: &str = "DOSERATE";
pub const SLOT1: &str = "SLOT1";
pub const SLOT2: &str = "SLOT2";
pub const COMMENT: &str = "COMMENT";

// Group table
pub const GROUPNAME: &str = "GROUPNAME";
pub const SUBGROUP: &str = "SUBGROUP";
pub const POSITION: &str = "POSITION";
pub const SUBPOSITION: &str = "SUBPOSITION";
pub const ISIMGROUP: &str = "ISIMGROUP";
pub const ISINTERRUPT: &str = "ISINTERRUPT";
pub const INTDESCRIPTION: &str = "INTDESCRIPTION";
pub const PORTTYPE: &str = "PORTTYPE";
pub const DOUBLEEXP: &str = "DOUBLEEXP";
pub const PORT1: &str = "PORT1";
pub const PORT2: &str = "PORT2";
pub const PORT1POS: &str = "PORT1POS";
pub const PORT2POS: &str = "PORT2POS";
pub const FIELDORDER: &str = "FIELDORDER";
pub const OPENDATE: &str = "OPENDATE";
pub const CLOSEDATE: &str = "CLOSEDATE";
pub const HRGROUP: &str = "HRGROUP";
pub const PRVFLDNAME: &str = "PRVFLDNAME";
pub const MLC_TOLERANCE: &str = "MLC_TOLERANCE";

/// Group table columns in insert order
pub const GROUP_COLUMNS: [&str; 23] = [
    PATIENT_ID,
    PLAN_ID,
    SITE_ID,
    FIELD_ID,
    GROUPNAME,
    SUBGROUP,
    POSITION,
    SUBPOSITION,
    ISIMGROUP,
    ISINTERRUPT,
    INTDESCRIPTION,
    PORTTYPE,
    DOUBLEEXP,
    PORT1,
    PORT2,
    PORT1POS,
    PORT2POS,
    FIELDORDER,
    OPENDATE,
    CLOSEDATE,
    HRGROUP,
    PRVFLDNAME,
    MLC_TOLERANCE,
];

/// FIELD table layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTableSchema {
    pub table: String,
    pub accessory_column: String,
    pub position_column: String,
}

impl FieldTableSchema {
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        Ok(Self {
            table: validate_identifier(&config.field_table)?.to_string(),
            accessory_column: validate_identifier(&config.accessory_column)?.to_string(),
            position_column: validate_identifier(&config.position_column)?.to_string(),
        })
    }

    /// Build a typed field record from a bridge row
    pub fn parse_row(&self, row: &JsonRow) -> Result<FieldRecord> {
        let field_id = required_text(row, FIELD_ID)?;
        Ok(FieldRecord {
            patient_id: PatientId::new(required_i64(row, PATIENT_ID)?)?,
            plan_id: required_i64(row, PLAN_ID)?,
            site_id: required_i64(row, SITE_ID)?,
            field_name: optional_text(row, FIELD_NAME)?.unwrap_or_default(),
            position: required_cell(row, &self.position_column)?,
            accessory: optional_text(row, &self.accessory_column)?,
            machine_id: optional_text(row, MACHINE_ID)?,
            dose_rate: optional_text(row, DOSERATE)?,
            slot1: blank_as_empty(optional_text(row, SLOT1)?),
            slot2: blank_as_empty(optional_text(row, SLOT2)?),
            comment: blank_as_empty(optional_text(row, COMMENT)?),
            field_id,
        })
    }
}

/// SMSGROUP table layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTableSchema {
    pub table: String,
}

impl GroupTableSchema {
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        Ok(Self {
            table: validate_identifier(&config.group_table)?.to_string(),
        })
    }

    /// Values for one insert, in `GROUP_COLUMNS` order
    pub fn insert_values(record: &GroupRecord) -> Vec<SqlValue> {
        vec![
            record.patient_id.into(),
            record.plan_id.into(),
            record.site_id.into(),
            record.field_id.as_str().into(),
            record.group_name.as_str().into(),
            record.sub_group.as_str().into(),
            record.position.clone(),
            record.sub_position.as_str().into(),
            record.is_im_group.into(),
            record.is_interrupt.into(),
            record.int_description.clone().into(),
            record.port_type.into(),
            record.double_exp.into(),
            record.port1.into(),
            record.port2.into(),
            record.port1_pos.into(),
            record.port2_pos.into(),
            record.field_order.into(),
            record.open_date.clone().into(),
            record.close_date.clone().into(),
            record.hr_group.clone().into(),
            record.prev_field_name.clone().into(),
            record.mlc_tolerance.as_str().into(),
        ]
    }

    /// Build a typed group record from a bridge row
    pub fn parse_row(&self, row: &JsonRow) -> Result<GroupRecord> {
        Ok(GroupRecord {
            patient_id: PatientId::new(required_i64(row, PATIENT_ID)?)?,
            plan_id: required_i64(row, PLAN_ID)?,
            site_id: required_i64(row, SITE_ID)?,
            field_id: required_text(row, FIELD_ID)?,
            group_name: optional_text(row, GROUPNAME)?.unwrap_or_default(),
            sub_group: optional_text(row, SUBGROUP)?.unwrap_or_default(),
            position: optional_cell(row, POSITION)?,
            sub_position: optional_text(row, SUBPOSITION)?.unwrap_or_default(),
            is_im_group: flag(row, ISIMGROUP)?,
            is_interrupt: flag(row, ISINTERRUPT)?,
            int_description: optional_text(row, INTDESCRIPTION)?,
            port_type: flag(row, PORTTYPE)?,
            double_exp: flag(row, DOUBLEEXP)?,
            port1: flag(row, PORT1)?,
            port2: flag(row, PORT2)?,
            port1_pos: flag(row, PORT1POS)?,
            port2_pos: flag(row, PORT2POS)?,
            field_order: flag(row, FIELDORDER)?,
            open_date: optional_text(row, OPENDATE)?,
            close_date: optional_text(row, CLOSEDATE)?,
            hr_group: optional_text(row, HRGROUP)?,
            prev_field_name: optional_text(row, PRVFLDNAME)?,
            mlc_tolerance: optional_text(row, MLC_TOLERANCE)?.unwrap_or_default(),
        })
    }
}

/// Column lookup; exact name first, then case-insensitive
fn lookup<'a>(row: &'a JsonRow, column: &str) -> Option<&'a Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

fn optional_cell(row: &JsonRow, column: &str) -> Result<SqlValue> {
    match lookup(row, column) {
        Some(value) => SqlValue::from_json(value)
            .map_err(|e| Error::Validation(format!("column {}: {}", column, e))),
        None => Ok(SqlValue::Null),
    }
}

fn required_cell(row: &JsonRow, column: &str) -> Result<SqlValue> {
    let value = lookup(row, column)
        .ok_or_else(|| Error::Validation(format!("row is missing column {}", column)))?;
    SqlValue::from_json(value).map_err(|e| Error::Validation(format!("column {}: {}", column, e)))
}

fn required_i64(row: &JsonRow, column: &str) -> Result<i64> {
    let cell = required_cell(row, column)?;
    cell.as_i64().ok_or_else(|| {
        Error::Validation(format!("column {} is not an integer: {:?}", column, cell))
    })
}

fn required_text(row: &JsonRow, column: &str) -> Result<String> {
    required_cell(row, column)?
        .as_text()
        .ok_or_else(|| Error::Validation(format!("column {} is NULL", column)))
}

fn optional_text(row: &JsonRow, column: &str) -> Result<Option<String>> {
    Ok(optional_cell(row, column)?.as_text())
}

fn flag(row: &JsonRow, column: &str) -> Result<i64> {
    let cell = optional_cell(row, column)?;
    if cell.is_null() {
        return Ok(0);
    }
    cell.as_i64().ok_or_else(|| {
        Error::Validation(format!("column {} is not an integer: {:?}", column, cell))
    })
}

/// The store pads empty slots with a space
fn blank_as_empty(value: Option<String>) -> Option<String> {
    value.map(|v| if v.trim().is_empty() { String::new() } else { v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FieldTableSchema {
        FieldTableSchema::from_config(&SchemaConfig::default()).unwrap()
    }

    fn row(value: Value) -> JsonRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("test row must be an object"),
        }
    }

    #[test]
    fn test_parse_field_row_with_string_cells() {
        let record = schema()
            .parse_row(&row(json!({
                "PATIENT_ID": "1001",
                "PLAN_ID": "2",
                "SITE_ID": "3",
                "FIELD_ID": "12_3",
                "FIELD_NAME": "AP",
                "POSITION_ID": "7",
                "ACCESSORY": "EA-5",
                "MACHINE_ID": "1",
                "DOSERATE": "300",
                "SLOT1": " ",
                "SLOT2": null,
                "COMMENT": "x"
            })))
            .unwrap();

        assert_eq!(record.patient_id.get(), 1001);
        assert_eq!(record.plan_id, 2);
        assert_eq!(record.site_id, 3);
        assert_eq!(record.field_id, "12_3");
        assert_eq!(record.position, SqlValue::Text("7".to_string()));
        assert_eq!(record.accessory.as_deref(), Some("EA-5"));
        assert_eq!(record.slot1.as_deref(), Some(""));
        assert_eq!(record.slot2, None);
    }

    #[test]
    fn test_parse_field_row_numeric_field_id() {
        let record = schema()
            .parse_row(&row(json!({
                "PATIENT_ID": 5,
                "PLAN_ID": 1,
                "SITE_ID": 1,
                "FIELD_ID": 12,
                "POSITION_ID": 4
            })))
            .unwrap();
        assert_eq!(record.field_id, "12");
        assert_eq!(record.field_name, "");
        assert_eq!(record.accessory, None);
    }

    #[test]
    fn test_parse_field_row_case_insensitive_columns() {
        let record = schema()
            .parse_row(&row(json!({
                "patient_id": 5,
                "plan_id": 1,
                "site_id": 1,
                "field_id": "1",
                "position_id": 4
            })))
            .unwrap();
        assert_eq!(record.site_id, 1);
    }

    #[test]
    fn test_parse_field_row_missing_or_bad_identity() {
        let missing = schema().parse_row(&row(json!({"PATIENT_ID": 5, "PLAN_ID": 1})));
        assert!(matches!(missing, Err(Error::Validation(_))));

        let bad_site = schema().parse_row(&row(json!({
            "PATIENT_ID": 5, "PLAN_ID": 1, "SITE_ID": "A", "FIELD_ID": "1", "POSITION_ID": 1
        })));
        assert!(matches!(bad_site, Err(Error::Validation(msg)) if msg.contains("SITE_ID")));
    }

    #[test]
    fn test_schema_rejects_bad_identifiers() {
        let config = SchemaConfig {
            accessory_column: "ACC; DROP".to_string(),
            ..SchemaConfig::default()
        };
        assert!(FieldTableSchema::from_config(&config).is_err());
    }

    #[test]
    fn test_group_row_round_trip_through_insert_values() {
        let schema = GroupTableSchema::from_config(&SchemaConfig::default()).unwrap();
        let parsed = schema
            .parse_row(&row(json!({
                "PATIENT_ID": "9", "PLAN_ID": "1", "SITE_ID": "2", "FIELD_ID": "4_2",
                "GROUPNAME": "ASGroup1", "SUBGROUP": "IMGroup3", "POSITION": "3",
                "SUBPOSITION": "2", "ISIMGROUP": "0", "ISINTERRUPT": "0",
                "INTDESCRIPTION": null, "PORTTYPE": "0", "DOUBLEEXP": "0",
                "PORT1": "0", "PORT2": "0", "PORT1POS": "0", "PORT2POS": "0",
                "FIELDORDER": "5", "OPENDATE": null, "CLOSEDATE": null,
                "HRGROUP": null, "PRVFLDNAME": null, "MLC_TOLERANCE": "2"
            })))
            .unwrap();

        assert_eq!(parsed.field_order, 5);
        assert_eq!(parsed.group_name, "ASGroup1");
        let values = GroupTableSchema::insert_values(&parsed);
        assert_eq!(values.len(), GROUP_COLUMNS.len());
        assert_eq!(values[17], SqlValue::Integer(5));
        assert_eq!(values[22], SqlValue::Text("2".to_string()));
        assert_eq!(values[10], SqlValue::Null);
    }

    #[test]
    fn test_group_columns_line_up_with_insert_values() {
        let schema = GroupTableSchema::from_config(&SchemaConfig::default()).unwrap();
        let mut cells = Map::new();
        for (index, column) in GROUP_COLUMNS.iter().enumerate() {
            cells.insert(column.to_string(), json!(index.to_string()));
        }
        let parsed = schema.parse_row(&cells).unwrap();
        let values = GroupTableSchema::insert_values(&parsed);

        // Every column reads back the cell written under its own name
        for (index, (column, value)) in GROUP_COLUMNS.iter().zip(&values).enumerate() {
            assert_eq!(value.to_string(), index.to_string(), "column {}", column);
        }
        assert_eq!(GROUP_COLUMNS[17], FIELDORDER);
    }
}
