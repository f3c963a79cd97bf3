use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::schema::Schema;

/// Verifies that every table declares a primary-key field.
///
/// Fails on the first offending table, naming it and the expected declaration shape.
/// Runs once before any adapter is constructed.
pub fn validate_schema(schema: &Schema) -> DepositResult<()> {
    for (name, table) in schema.tables() {
        let valid = table
            .primary_key()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);

        if !valid {
            log::error!("Table {} does not declare a primary key", name);
            return Err(DepositError::new(
                &format!(
                    "Invalid schema for table {}: expected {{ key: \"<primary key field>\", indexes?: [\"<field>\", ...] }}",
                    name
                ),
                ErrorKind::ConfigurationError,
            ));
        }
    }
    Ok(())
}

impl Schema {
    /// See [`validate_schema`].
    pub fn validate(&self) -> DepositResult<()> {
        validate_schema(self)
    }
}
