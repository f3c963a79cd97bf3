//! Lazy query pipelines over one table.
//!
//! A [`QueryBuilder`] collects [`QueryOp`] steps and evaluates them in order over a
//! single `get_all` snapshot when a terminal method is called. Filters are expressed as
//! [`Predicate`] values, usually built with [`field`].
mod predicate;
mod query_builder;
mod query_op;

pub use predicate::{field, Comparison, FieldPredicate, Predicate, PredicateFn};
pub use query_builder::*;
pub use query_op::*;
