// Session token issuing and validation (HS256 JWT)

use crate::auth::revocation::{NoRevocation, RevocationList};
use crate::auth::session::Principal;
use crate::authz::permissions::Role;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::errors::{AppError, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Claims
// ============================================================================

/// Claim set carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub role: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration time (Unix seconds)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl SessionClaims {
    /// Expired once `now` reaches `exp`
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        now_secs >= self.exp
    }
}

// ============================================================================
// SessionIssuer
// ============================================================================

/// Mints and validates signed session tokens
///
/// Signing and validation are pure; the only state consulted is the optional
/// revocation list in [`SessionIssuer::authenticate`].
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl_seconds: i64,
    clock: SharedClock,
    revocation: Arc<dyn RevocationList>,
    /// Session cookies carry `Secure`
    secure_cookies: bool,
}

impl SessionIssuer {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl_seconds: i64,
        clock: SharedClock,
    ) -> Result<Self> {
        if secret.is_empty() {
            return Err(AppError::Configuration(
                "JWT secret must not be empty".to_string(),
            ));
        }
        if ttl_seconds <= 0 {
            return Err(AppError::Configuration(
                "Session TTL must be positive".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_seconds,
            clock,
            revocation: Arc::new(NoRevocation),
            secure_cookies: false,
        })
    }

    /// Build from configuration; production without a usable secret fails here
    pub fn from_config(config: &Config, clock: SharedClock) -> Result<Self> {
        let secret = config.signing_secret()?;
        Ok(Self::new(
            &secret,
            config.auth.jwt_issuer.clone(),
            config.auth.jwt_audience.clone(),
            config.auth.session_ttl_seconds,
            clock,
        )?
        .with_secure_cookies(config.environment.is_production()))
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    pub fn with_revocation(mut self, revocation: Arc<dyn RevocationList>) -> Self {
        self.revocation = revocation;
        self
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn revocation_enabled(&self) -> bool {
        self.revocation.is_enabled()
    }

    /// Sign a new session token for `user_id`
    pub fn issue(&self, user_id: &str, role: Role, session_id: &str) -> Result<String> {
        let now = self.clock.now_secs();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            session_id: session_id.to_string(),
            role: role.as_str().to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::TokenGeneration(format!("Failed to encode JWT: {}", e)))
    }

    /// Verify signature, issuer, audience and expiry
    pub fn validate(&self, token: &str) -> Result<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims;

        if claims.is_expired_at(self.clock.now_secs()) {
            return Err(AppError::InvalidToken("expired".to_string()));
        }

        let role: Role = claims
            .role
            .parse()
            .map_err(|_| AppError::InvalidToken(format!("unknown role '{}'", claims.role)))?;

        Ok(Principal {
            user_id: claims.sub,
            session_id: claims.session_id,
            role,
            expires_at: claims.exp,
        })
    }

    /// `validate` plus the revocation list
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        let principal = self.validate(token)?;
        if self.revocation.is_revoked(&principal.session_id).await? {
            return Err(AppError::InvalidToken("revoked".to_string()));
        }
        Ok(principal)
    }

    /// Revoke the session for the rest of its lifetime (no-op when revocation is off)
    pub async fn revoke(&self, principal: &Principal) -> Result<()> {
        let remaining = principal.expires_at - self.clock.now_secs();
        if remaining > 0 {
            self.revocation
                .revoke(&principal.session_id, remaining)
                .await?;
        }
        Ok(())
    }
}
