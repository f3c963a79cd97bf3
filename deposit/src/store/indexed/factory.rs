use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::store::indexed::database::DatabaseStorage;
use crate::store::indexed::{IndexedDatabase, NativeTransaction};
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};

static GLOBAL_FACTORY: LazyLock<IndexedFactory> = LazyLock::new(IndexedFactory::new);

/// Registry of named indexed databases.
///
/// [`IndexedFactory::global`] is shared by the whole process, so two adapters opened
/// with the same namespace see the same data. Tests usually create their own factory
/// with [`IndexedFactory::new`] to stay isolated.
#[derive(Clone, Default)]
pub struct IndexedFactory {
    databases: Arc<DashMap<String, Arc<DatabaseStorage>>>,
}

impl IndexedFactory {
    pub fn new() -> Self {
        IndexedFactory {
            databases: Arc::new(DashMap::new()),
        }
    }

    /// The process-wide factory.
    pub fn global() -> IndexedFactory {
        GLOBAL_FACTORY.clone()
    }

    /// Opens `name` at `version`, creating the database if needed.
    ///
    /// When the stored version is lower, `on_upgrade` runs in a version-change
    /// transaction with the old and new versions. If it fails the database keeps its
    /// previous version and content, and its error is returned.
    ///
    /// # Errors
    /// - [`ErrorKind::ConfigurationError`] if `version` is 0.
    /// - [`ErrorKind::VersionError`] if the stored version is higher than `version`.
    pub fn open<F>(&self, name: &str, version: u32, on_upgrade: F) -> DepositResult<IndexedDatabase>
    where
        F: FnOnce(&IndexedDatabase, u32, u32, &mut NativeTransaction) -> DepositResult<()>,
    {
        if version == 0 {
            log::error!("Database {} cannot be opened at version 0", name);
            return Err(DepositError::new(
                &format!("Database {} cannot be opened at version 0", name),
                ErrorKind::ConfigurationError,
            ));
        }

        let storage = Arc::clone(
            &*self
                .databases
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(DatabaseStorage::new(name))),
        );

        let database = IndexedDatabase::new(Arc::clone(&storage));
        match database.upgrade(version, on_upgrade) {
            Ok(()) => Ok(database),
            Err(err) => {
                // a database that never reached a version is not kept around
                if storage.version() == 0 {
                    self.databases
                        .remove_if(name, |_, current| Arc::ptr_eq(current, &storage));
                }
                database.close();
                Err(err)
            }
        }
    }

    /// Deletes a database. Open connections to it are closed.
    ///
    /// Returns `false` if no such database existed.
    pub fn delete_database(&self, name: &str) -> bool {
        match self.databases.remove(name) {
            Some((_, storage)) => {
                storage.mark_deleted();
                log::info!("Deleted database {}", name);
                true
            }
            None => false,
        }
    }

    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .databases
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Stored version of a database, `None` if it does not exist.
    pub fn version_of(&self, name: &str) -> Option<u32> {
        self.databases.get(name).map(|storage| storage.version())
    }
}
