//! Literal SQL statement builder
//!
//! The database bridge only accepts SQL text, so bound values are rendered
//! into the statement here, in one place, with quoting applied per value
//! type. Callers never concatenate values into SQL themselves.

use crate::models::SqlValue;
use crate::{Error, Result};

/// SQL template with `?` placeholders and the values bound to them
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    template: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            params: Vec::new(),
        }
    }

    /// Bind the next placeholder
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Render the statement text
    ///
    /// `?` inside quoted literals of the template is left alone. Fails when
    /// the placeholder count and the bound value count differ.
    pub fn render(&self) -> Result<String> {
        let mut out = String::with_capacity(self.template.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        let mut in_quote = false;
        let mut placeholders = 0usize;

        for ch in self.template.chars() {
            match ch {
                '\'' => {
                    in_quote = !in_quote;
                    out.push(ch);
                }
                '?' if !in_quote => {
                    placeholders += 1;
                    let value = params.next().ok_or_else(|| {
                        Error::Query(format!(
                            "statement has more placeholders than the {} bound values",
                            self.params.len()
                        ))
                    })?;
                    out.push_str(&literal(value)?);
                }
                _ => out.push(ch),
            }
        }

        if placeholders != self.params.len() {
            return Err(Error::Query(format!(
                "statement has {} placeholders but {} bound values",
                placeholders,
                self.params.len()
            )));
        }

        Ok(out)
    }
}

/// Render one value as an SQL literal
pub fn literal(value: &SqlValue) -> Result<String> {
    match value {
        SqlValue::Null => Ok("NULL".to_string()),
        SqlValue::Integer(i) => Ok(i.to_string()),
        SqlValue::Float(f) => {
            if !f.is_finite() {
                return Err(Error::Query(format!("cannot render non-finite number {}", f)));
            }
            Ok(f.to_string())
        }
        SqlValue::Text(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
    }
}

/// Validate a table or column identifier before it is placed into SQL
///
/// Identifiers cannot be bound, so only plain ASCII names are accepted.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut bytes = name.bytes();
    let valid = match bytes.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == b'_')
                && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        None => false,
    };

    if valid {
        Ok(name)
    } else {
        Err(Error::Validation(format!("invalid SQL identifier: '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_binds_in_order() {
        let sql = Statement::new("UPDATE FIELD SET SLOT1 = ? WHERE PATIENT_ID = ? AND FIELD_ID = ?")
            .bind("EA-5")
            .bind(12i64)
            .bind("3_1")
            .render()
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE FIELD SET SLOT1 = 'EA-5' WHERE PATIENT_ID = 12 AND FIELD_ID = '3_1'"
        );
    }

    #[test]
    fn test_text_quotes_are_doubled() {
        let sql = Statement::new("SELECT * FROM FIELD WHERE FIELD_ID = ?")
            .bind("1'; DROP TABLE FIELD; --")
            .render()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM FIELD WHERE FIELD_ID = '1''; DROP TABLE FIELD; --'"
        );
    }

    #[test]
    fn test_placeholder_inside_literal_is_kept() {
        let sql = Statement::new("SELECT '?' AS Q, ? AS V")
            .bind(SqlValue::Null)
            .render()
            .unwrap();
        assert_eq!(sql, "SELECT '?' AS Q, NULL AS V");
    }

    #[test]
    fn test_placeholder_count_mismatch() {
        assert!(Statement::new("VALUES (?, ?)").bind(1i64).render().is_err());
        assert!(Statement::new("VALUES (?)")
            .bind(1i64)
            .bind(2i64)
            .render()
            .is_err());
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert!(literal(&SqlValue::Float(f64::NAN)).is_err());
        assert_eq!(literal(&SqlValue::Float(2.5)).unwrap(), "2.5");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("SMSGROUP").is_ok());
        assert!(validate_identifier("MLC_TOLERANCE").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1FIELD").is_err());
        assert!(validate_identifier("FIELD; DROP").is_err());
        assert!(validate_identifier("FIELD-ID").is_err());
    }
}
