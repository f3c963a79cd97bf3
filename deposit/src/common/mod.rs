//! Common types and helpers shared by the adapters and the query builder.

mod array_utils;
mod clock;
mod constants;
mod encoding;
mod expiry;
mod fields;
mod record_key;
mod search;
mod sort_order;
mod type_utils;

pub use array_utils::*;
pub use clock::*;
pub use constants::*;
pub use encoding::*;
pub use expiry::*;
pub use fields::*;
pub use record_key::*;
pub use search::*;
pub use sort_order::*;
pub use type_utils::*;
