// Warden: request gatekeeping, login throttling, sessions and RBAC

pub mod api;
pub mod audit;
pub mod auth;
pub mod authz;
pub mod clock;
pub mod config;
pub mod errors;
pub mod gatekeeper;
pub mod observability;
pub mod rate_limit;
pub mod redis;
pub mod users;

pub use config::Config;
pub use errors::{AppError, Result};
