// stored entry constants
pub const EXPIRES_AT: &str = "expiresAt";

// flat layout constants
pub const KEY_SEPARATOR: &str = ":";

// query constants
pub const GROUP_KEY: &str = "key";
pub const GROUP_VALUES: &str = "values";
pub const DEFAULT_SEARCH_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MEMO_CAPACITY: usize = 16;

// deposit constants
pub const DEFAULT_NAMESPACE: &str = "deposit";
pub const INITIAL_SCHEMA_VERSION: u32 = 1;
