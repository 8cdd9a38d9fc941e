pub mod long_term;
mod persist;
pub mod response_cache;
pub mod types;

pub use long_term::LongTermMemory;
pub use response_cache::{fingerprint, ResponseCache, DEFAULT_TTL};
pub use types::*;
