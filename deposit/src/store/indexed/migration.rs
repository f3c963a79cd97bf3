use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::schema::Schema;
use crate::store::indexed::{IndexedDatabase, NativeTransaction};
use std::sync::Arc;

/// User-supplied upgrade step for the indexed adapter.
///
/// Called during a version upgrade, after the declared tables and indexes exist, with
/// the database being upgraded, the old and new versions, the version-change
/// transaction and the schema. Returning an error aborts the whole upgrade.
pub type MigrationFn = Arc<
    dyn Fn(&IndexedDatabase, u32, u32, &mut NativeTransaction, &Schema) -> DepositResult<()>
        + Send
        + Sync,
>;

/// Wraps a closure as a [`MigrationFn`].
pub fn migration<F>(f: F) -> MigrationFn
where
    F: Fn(&IndexedDatabase, u32, u32, &mut NativeTransaction, &Schema) -> DepositResult<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Brings the database layout in line with `schema`, then runs `migration`.
///
/// Missing tables are created with their primary key as key path. Declared indexes are
/// created when absent; redundant declarations are skipped with a warning and an index
/// that cannot be created is logged and skipped.
pub(crate) fn upgrade_schema(
    database: &IndexedDatabase,
    old_version: u32,
    new_version: u32,
    tx: &mut NativeTransaction,
    schema: &Schema,
    migration: Option<&MigrationFn>,
) -> DepositResult<()> {
    for (table, declaration) in schema.tables() {
        let key_field = schema.key_field(table)?;
        if !tx.contains_object_store(table) {
            log::debug!("Creating table {} keyed by {}", table, key_field);
            tx.create_object_store(table, key_field)?;
        }

        for field in declaration.indexes() {
            if field == key_field {
                log::warn!(
                    "Index {} on table {} duplicates the primary key, skipping",
                    field,
                    table
                );
                continue;
            }
            if tx.index_names(table)?.contains(field) {
                log::warn!("Index {} on table {} already exists, skipping", field, table);
                continue;
            }
            if let Err(err) = tx.create_index(table, field, field) {
                log::error!("Failed to create index {} on table {}: {}", field, table, err);
            }
        }
    }

    if let Some(migration) = migration {
        log::info!(
            "Running migration from version {} to {}",
            old_version,
            new_version
        );
        migration(database, old_version, new_version, tx, schema).map_err(|err| {
            log::error!(
                "Migration from version {} to {} failed: {}",
                old_version,
                new_version,
                err
            );
            DepositError::new_with_cause(
                &format!(
                    "Migration from version {} to {} failed",
                    old_version, new_version
                ),
                ErrorKind::MigrationError,
                err,
            )
        })?;
    }
    Ok(())
}
