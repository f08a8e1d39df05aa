//! Typed row models for the field and group tables

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patient identifier as stored in PATIENT_ID
///
/// Always non-negative. Parsed once at the invocation boundary so nothing
/// downstream has to re-validate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PatientId(i64);

impl PatientId {
    pub fn new(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(Error::Validation(format!(
                "patient id must be non-negative, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for PatientId {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PatientId> for i64 {
    fn from(id: PatientId) -> i64 {
        id.0
    }
}

impl FromStr for PatientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("patient id is empty".to_string()));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Validation(format!(
                "patient id must be a non-negative integer, got '{}'",
                trimmed
            )));
        }
        let value = trimmed
            .parse::<i64>()
            .map_err(|e| Error::Validation(format!("patient id '{}': {}", trimmed, e)))?;
        Self::new(value)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scalar cell value as carried by the bridge's JSON rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a JSON cell into a scalar. Arrays and objects are not cells.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value as J;
        match value {
            J::Null => Ok(SqlValue::Null),
            J::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::Float(f))
                } else {
                    Err(Error::Validation(format!("numeric cell out of range: {}", n)))
                }
            }
            J::String(s) => Ok(SqlValue::Text(s.clone())),
            J::Array(_) | J::Object(_) => Err(Error::Validation(format!(
                "expected a scalar cell, got {}",
                value
            ))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view, accepting numeric text (the ODBC driver behind the
    /// bridge returns most columns as strings)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Float(f) => whole_f64_to_i64(*f),
            SqlValue::Text(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .or_else(|| t.parse::<f64>().ok().and_then(whole_f64_to_i64))
            }
            _ => None,
        }
    }

    /// Text view; `None` for NULL
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Whole floats inside the `i64` range; `as` would saturate outside it
fn whole_f64_to_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<usize> for SqlValue {
    fn from(v: usize) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<PatientId> for SqlValue {
    fn from(v: PatientId) -> Self {
        SqlValue::Integer(v.get())
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Unique identity of a field row within a patient's plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldKey {
    pub patient_id: PatientId,
    pub plan_id: i64,
    pub site_id: i64,
    pub field_id: String,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patient={} plan={} site={} field={}",
            self.patient_id, self.plan_id, self.site_id, self.field_id
        )
    }
}

/// One row of the FIELD table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub patient_id: PatientId,
    pub plan_id: i64,
    pub site_id: i64,
    /// May be compound: `<position>_<subposition>`
    pub field_id: String,
    pub field_name: String,
    pub position: SqlValue,
    pub accessory: Option<String>,
    pub machine_id: Option<String>,
    pub dose_rate: Option<String>,
    pub slot1: Option<String>,
    pub slot2: Option<String>,
    pub comment: Option<String>,
}

impl FieldRecord {
    pub fn key(&self) -> FieldKey {
        FieldKey {
            patient_id: self.patient_id,
            plan_id: self.plan_id,
            site_id: self.site_id,
            field_id: self.field_id.clone(),
        }
    }
}

/// One derived row of the SMSGROUP table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub patient_id: PatientId,
    pub plan_id: i64,
    pub site_id: i64,
    pub field_id: String,
    pub group_name: String,
    pub sub_group: String,
    pub position: SqlValue,
    pub sub_position: String,
    pub is_im_group: i64,
    pub is_interrupt: i64,
    pub int_description: Option<String>,
    pub port_type: i64,
    pub double_exp: i64,
    pub port1: i64,
    pub port2: i64,
    pub port1_pos: i64,
    pub port2_pos: i64,
    pub field_order: i64,
    pub open_date: Option<String>,
    pub close_date: Option<String>,
    pub hr_group: Option<String>,
    pub prev_field_name: Option<String>,
    pub mlc_tolerance: String,
}

impl GroupRecord {
    pub fn key(&self) -> FieldKey {
        FieldKey {
            patient_id: self.patient_id,
            plan_id: self.plan_id,
            site_id: self.site_id,
            field_id: self.field_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patient_id_parsing() {
        assert_eq!("  1234 ".parse::<PatientId>().unwrap().get(), 1234);
        assert!("".parse::<PatientId>().is_err());
        assert!("-5".parse::<PatientId>().is_err());
        assert!("12a".parse::<PatientId>().is_err());
        assert!("1 OR 1=1".parse::<PatientId>().is_err());
        assert!(PatientId::new(-1).is_err());
    }

    #[test]
    fn test_sql_value_from_json() {
        assert_eq!(SqlValue::from_json(&json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&json!(7)).unwrap(), SqlValue::Integer(7));
        assert_eq!(SqlValue::from_json(&json!(1.5)).unwrap(), SqlValue::Float(1.5));
        assert_eq!(SqlValue::from_json(&json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(
            SqlValue::from_json(&json!("EA-5")).unwrap(),
            SqlValue::Text("EA-5".to_string())
        );
        assert!(SqlValue::from_json(&json!([1, 2])).is_err());
        assert!(SqlValue::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_sql_value_integer_view_accepts_numeric_text() {
        assert_eq!(SqlValue::Text(" 42 ".to_string()).as_i64(), Some(42));
        assert_eq!(SqlValue::Text("3.0".to_string()).as_i64(), Some(3));
        assert_eq!(SqlValue::Text("3.5".to_string()).as_i64(), None);
        assert_eq!(SqlValue::Float(2.0).as_i64(), Some(2));
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_sql_value_integer_view_rejects_out_of_range() {
        assert_eq!(SqlValue::Text("1e20".to_string()).as_i64(), None);
        assert_eq!(SqlValue::Text("-1e20".to_string()).as_i64(), None);
        assert_eq!(SqlValue::Float(1e20).as_i64(), None);
        assert_eq!(SqlValue::Float(9.3e18).as_i64(), None);
        assert_eq!(SqlValue::Float(f64::INFINITY).as_i64(), None);
        assert_eq!(SqlValue::Float(-9.2e18).as_i64(), Some(-9_200_000_000_000_000_000));
        assert_eq!(SqlValue::Text("1e3".to_string()).as_i64(), Some(1000));
    }

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Integer(7).to_string(), "7");
        assert_eq!(SqlValue::Text("7".to_string()).to_string(), "7");
        assert_eq!(SqlValue::Null.to_string(), "");
        assert_eq!(SqlValue::Null.as_text(), None);
    }

    #[test]
    fn test_patient_id_serde_rejects_negative() {
        let parsed: std::result::Result<PatientId, _> = serde_json::from_str("-3");
        assert!(parsed.is_err());
        let ok: PatientId = serde_json::from_str("3").unwrap();
        assert_eq!(ok.get(), 3);
    }
}
