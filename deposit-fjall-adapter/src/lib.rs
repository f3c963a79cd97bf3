//! Persistent key-value storage for the Deposit flat adapter, built on the
//! [fjall](https://docs.rs/fjall) LSM-tree engine.
//!
//! ```rust,ignore
//! use deposit::deposit::Deposit;
//! use deposit::schema::TableSchema;
//! use deposit::store::AdapterKind;
//! use deposit_fjall_adapter::FjallKeyValueStore;
//!
//! let store = FjallKeyValueStore::with_config()
//!     .db_path("/path/to/db")
//!     .build()?;
//!
//! let deposit = Deposit::builder()
//!     .adapter_kind(AdapterKind::Flat)
//!     .key_value_store(store)
//!     .table("notes", TableSchema::new("id"))
//!     .open()?;
//! ```

mod builder;
mod config;
mod error;
mod store;

pub use builder::*;
pub use config::*;
pub use error::*;
pub use store::*;
