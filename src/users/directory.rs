// Account lookup behind a trait, with an in-memory implementation

use crate::auth::password::hash_password;
use crate::auth::validation::normalize_identifier;
use crate::authz::permissions::Role;
use crate::config::SeedUser;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

// ============================================================================
// Domain Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    /// Normalized (lower-cased, sanitized)
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// Public view of a user, never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar: String,
    pub is_active: bool,
    pub email_verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            avatar: initials(&user.name),
            is_active: user.active,
            email_verified: user.email_verified,
        }
    }
}

/// Up to two upper-cased initials
fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

// ============================================================================
// Directory
// ============================================================================

/// Source of user accounts
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a new account; an existing email is `AccountExists`
    async fn insert(&self, user: User) -> Result<User>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, User>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured seed accounts, hashing plaintext passwords
    pub fn from_seed_users(seeds: &[SeedUser]) -> Result<Self> {
        let directory = Self::new();

        for seed in seeds {
            let role: Role = seed.role.parse().map_err(|_| {
                AppError::Configuration(format!(
                    "Seed user '{}' has unknown role '{}'",
                    seed.id, seed.role
                ))
            })?;

            let password_hash = match (&seed.password_hash, &seed.password) {
                (Some(hash), _) => hash.clone(),
                (None, Some(password)) => hash_password(password)?,
                (None, None) => {
                    return Err(AppError::Configuration(format!(
                        "Seed user '{}' has no password",
                        seed.id
                    )))
                }
            };

            let user = User {
                id: seed.id.clone(),
                email: normalize_identifier(&seed.email),
                name: seed.name.clone(),
                role,
                password_hash,
                active: seed.active,
                email_verified: true,
                created_at: Utc::now(),
            };
            match directory.users.entry(user.email.clone()) {
                Entry::Occupied(_) => {
                    return Err(AppError::Configuration(format!(
                        "Duplicate seed user email for '{}'",
                        seed.id
                    )))
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(user);
                }
            }
        }

        tracing::info!(count = directory.users.len(), "User directory seeded");
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .get(&normalize_identifier(email))
            .map(|u| u.clone()))
    }

    async fn insert(&self, mut user: User) -> Result<User> {
        user.email = normalize_identifier(&user.email);
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::AccountExists),
            Entry::Vacant(vacant) => Ok(vacant.insert(user).clone()),
        }
    }
}
