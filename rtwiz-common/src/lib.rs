//! # RT Wizard Common Library
//!
//! Shared code for the RT wizard tools including:
//! - Error type and result alias
//! - Configuration loading
//! - Typed field/group row models
//! - Table schema declarations and row conversion
//! - Literal SQL statement rendering for the database bridge

pub mod config;
pub mod error;
pub mod models;
pub mod schema;
pub mod sql;

pub use error::{Error, Result};
pub use models::{FieldKey, FieldRecord, GroupRecord, PatientId, SqlValue};
