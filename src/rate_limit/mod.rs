pub mod fixed_window;
pub mod headers;
pub mod limiter;
pub mod redis_store;

pub use fixed_window::{InMemoryRateLimitStore, RateLimitDecision, RateLimitStore, WindowRecord};
pub use headers::{apply_rate_limit_headers, is_rate_limit_header};
pub use limiter::{RateLimiter, RouteClass};
pub use redis_store::RedisRateLimitStore;
