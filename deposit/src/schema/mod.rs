//! Declared table schema and its validation.

mod table_schema;
mod validator;

pub use table_schema::*;
pub use validator::*;
