use crate::common::{field_value, RecordKey};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declaration of one table: its primary-key field and secondary index fields.
///
/// The declarative form deserializes from `{"key": "id", "indexes": ["email"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(rename = "key", default, skip_serializing_if = "Option::is_none")]
    primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indexes: Vec<String>,
}

impl TableSchema {
    pub fn new(primary_key: &str) -> Self {
        TableSchema {
            primary_key: Some(primary_key.to_string()),
            indexes: Vec::new(),
        }
    }

    /// Adds a secondary index over `field`.
    pub fn index(mut self, field: &str) -> Self {
        self.indexes.push(field.to_string());
        self
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }
}

/// Mapping from table name to its declaration, in declaration order.
///
/// # Examples
///
/// ```rust,ignore
/// use deposit::schema::{Schema, TableSchema};
///
/// let schema = Schema::new()
///     .table("users", TableSchema::new("id").index("email"))
///     .table("items", TableSchema::new("sku"));
/// schema.validate()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    tables: IndexMap<String, TableSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Schema {
            tables: IndexMap::new(),
        }
    }

    /// Parses the declarative form `{"users": {"key": "id", "indexes": [...]}}`.
    pub fn from_json(value: Value) -> DepositResult<Schema> {
        serde_json::from_value(value).map_err(|err| {
            DepositError::new(
                &format!("Invalid schema declaration: {}", err),
                ErrorKind::ConfigurationError,
            )
        })
    }

    pub fn table(mut self, name: &str, table: TableSchema) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn insert(&mut self, name: &str, table: TableSchema) {
        self.tables.insert(name.to_string(), table);
    }

    pub fn tables(&self) -> impl Iterator<Item = (&String, &TableSchema)> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, table: &str) -> DepositResult<&TableSchema> {
        self.tables.get(table).ok_or_else(|| {
            log::error!("Table {} is not declared in the schema", table);
            DepositError::new(
                &format!("Table {} is not declared in the schema", table),
                ErrorKind::TableNotFound,
            )
        })
    }

    /// Returns the primary-key field of a declared table.
    pub fn key_field(&self, table: &str) -> DepositResult<&str> {
        let declaration = self.get(table)?;
        declaration.primary_key().ok_or_else(|| {
            DepositError::new(
                &format!("Table {} does not declare a primary key", table),
                ErrorKind::ConfigurationError,
            )
        })
    }

    /// Extracts the primary key of `record` for `table`.
    ///
    /// Fails with [`ErrorKind::InvalidRecord`] for non-objects and with
    /// [`ErrorKind::MissingPrimaryKey`] when the key field is absent or null.
    pub fn key_of(&self, table: &str, record: &Value) -> DepositResult<RecordKey> {
        let key_field = self.key_field(table)?;
        if !record.is_object() {
            return Err(DepositError::new(
                &format!("Record for table {} must be an object", table),
                ErrorKind::InvalidRecord,
            ));
        }

        match field_value(record, key_field) {
            Some(Value::Null) | None => Err(DepositError::new(
                &format!(
                    "Record for table {} is missing its primary key field {}",
                    table, key_field
                ),
                ErrorKind::MissingPrimaryKey,
            )),
            Some(value) => RecordKey::from_value(value),
        }
    }
}
