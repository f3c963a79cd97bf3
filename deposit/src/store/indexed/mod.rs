//! The indexed adapter and the versioned, transactional database it runs on.
//!
//! An [`IndexedFactory`] owns named databases. Opening a database at a higher version
//! than the stored one runs an upgrade inside a version-change [`NativeTransaction`]:
//! that is the only place object stores and indexes can be created, and where a
//! [`MigrationFn`] gets to rewrite existing data.
//!
//! Ordinary transactions run against a snapshot of the database. Read-write
//! transactions are serialized per database and publish their scoped object stores on
//! commit; a failing transaction publishes nothing.

mod database;
mod factory;
mod indexed_adapter;
mod migration;
mod object_store;
mod transaction;

pub use database::*;
pub use factory::*;
pub use indexed_adapter::*;
pub use migration::*;
pub use transaction::*;
