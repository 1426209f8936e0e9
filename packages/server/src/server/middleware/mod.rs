pub mod client_meta;
pub mod csrf;
pub mod rate_limit;
pub mod session_auth;

pub use client_meta::{extract_client_meta, ClientMeta};
pub use csrf::csrf_middleware;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use session_auth::{session_auth_middleware, CurrentUser};
