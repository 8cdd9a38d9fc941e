pub mod permissions;
pub mod rate_limiter;

pub use permissions::{PermissionEngine, PermissionResult};
pub use rate_limiter::{RateLimiter, DEFAULT_WINDOW};
