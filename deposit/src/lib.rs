//! # Deposit - Schema-typed Embedded Record Store
//!
//! Deposit stores JSON records in named tables. Each table declares the field that
//! holds its primary key and, optionally, fields to index. Records can carry a
//! time-to-live and stop being visible once it has elapsed.
//!
//! ## Backends
//!
//! Two adapters implement the same [`store::StorageAdapter`] contract:
//!
//! - **Flat**: every record is one entry in a string key-value store, keyed by
//!   `namespace:version:table:key`. Multi-record operations are not atomic.
//! - **Indexed**: an in-process object-store database with versioned schemas,
//!   secondary indexes, migrations and atomic cross-table transactions.
//!
//! The `deposit-fjall-adapter` crate provides a persistent key-value store for the
//! flat adapter.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deposit::deposit::Deposit;
//! use deposit::schema::TableSchema;
//! use deposit::common::SortOrder;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let deposit = Deposit::builder()
//!     .namespace("shop")
//!     .table("products", TableSchema::new("sku").index("category"))
//!     .open()?;
//!
//! deposit.put("products", json!({"sku": "A-1", "category": "tools", "price": 12}), None)?;
//! deposit.put("products", json!({"sku": "B-7", "category": "tools", "price": 30}),
//!     Some(Duration::from_secs(3600)))?;
//!
//! let cheapest = deposit
//!     .query("products")
//!     .equals("category", "tools")
//!     .order_by("price", SortOrder::Ascending)
//!     .first()?;
//! ```
//!
//! ## Module Organization
//!
//! - [`deposit`] - The store facade
//! - [`deposit_builder`] - Fluent builder for opening a store
//! - [`deposit_config`] - Store configuration
//! - [`schema`] - Table declarations and validation
//! - [`store`] - Storage adapters and backends
//! - [`query`] - Lazy query builder, predicates and pipeline steps
//! - [`transaction`] - Table snapshots and patch operations
//! - [`common`] - Record keys, clocks, sorting and other shared helpers
//! - [`errors`] - Error types and result definitions

pub mod common;
pub mod deposit;
pub mod deposit_builder;
pub mod deposit_config;
pub mod errors;
pub mod query;
pub mod schema;
pub mod store;
pub mod transaction;
