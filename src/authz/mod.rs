pub mod middleware;
pub mod model;
pub mod permissions;

pub use middleware::authorize;
pub use model::PermissionModel;
pub use permissions::{Permission, Role, RolePermissionEntry, ROLE_TABLE};
