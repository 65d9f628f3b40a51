pub mod jwt;
pub mod password;
pub mod redis_attempts;
pub mod revocation;
pub mod session;
pub mod throttle;
pub mod validation;

pub use jwt::{SessionClaims, SessionIssuer};
pub use redis_attempts::RedisAttemptStore;
pub use revocation::{InMemoryRevocationList, NoRevocation, RedisRevocationList, RevocationList};
pub use session::{require_session, Principal};
pub use throttle::{AttemptStore, InMemoryAttemptStore, LockStatus, LockoutPolicy, LoginThrottle};
