use crate::{
    api::{auth, health, roles},
    audit::{AuditLogger, AuditRecorder, AuditStorage},
    auth::{
        require_session, AttemptStore, InMemoryAttemptStore, InMemoryRevocationList,
        LockoutPolicy, LoginThrottle, RedisAttemptStore, RedisRevocationList, RevocationList,
        SessionIssuer,
    },
    authz::{Permission, PermissionModel},
    clock::SharedClock,
    config::{Config, StoreBackend},
    errors::{AppError, Result},
    gatekeeper::{gatekeeper_middleware, RequestGatekeeper},
    observability::HealthChecker,
    rate_limit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter, RedisRateLimitStore},
    require_permissions,
    users::{InMemoryUserDirectory, UserDirectory},
};
use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const TEAM_VIEW: &[Permission] = &[Permission::TeamView];

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: SharedClock,
    pub permissions: Arc<PermissionModel>,
    pub issuer: Arc<SessionIssuer>,
    pub throttle: Arc<LoginThrottle>,
    pub limiter: Arc<RateLimiter>,
    pub gatekeeper: Arc<RequestGatekeeper>,
    pub users: Arc<dyn UserDirectory>,
    pub audit: AuditRecorder,
    pub audit_logger: AuditLogger,
    pub health_checker: Arc<HealthChecker>,
    /// Set when revoked sessions are held in process and need sweeping
    #[from_ref(skip)]
    pub local_revocations: Option<Arc<InMemoryRevocationList>>,
}

impl AppState {
    /// Wire every component from configuration
    ///
    /// Spawns the audit batch processor, so this must run inside a tokio runtime.
    pub async fn from_config(
        config: Config,
        clock: SharedClock,
        audit_storage: Arc<dyn AuditStorage>,
    ) -> Result<Self> {
        let redis_manager = match config.rate_limit.backend {
            StoreBackend::Redis => Some(crate::redis::create_client(&config.redis).await?),
            StoreBackend::Memory => None,
        };

        // Both keyed stores follow the backend, so instances share budgets
        let (rate_store, attempt_store): (Arc<dyn RateLimitStore>, Arc<dyn AttemptStore>) =
            match &redis_manager {
                Some(manager) => (
                    Arc::new(RedisRateLimitStore::new(manager.clone())),
                    Arc::new(RedisAttemptStore::new(manager.clone())),
                ),
                None => (
                    Arc::new(InMemoryRateLimitStore::new()),
                    Arc::new(InMemoryAttemptStore::new()),
                ),
            };
        let limiter = Arc::new(RateLimiter::new(
            rate_store,
            config.rate_limit.clone(),
            clock.clone(),
        ));

        let mut local_revocations = None;
        let mut issuer = SessionIssuer::from_config(&config, clock.clone())?;
        if config.auth.revocation_enabled {
            let revocation: Arc<dyn RevocationList> = match &redis_manager {
                Some(manager) => Arc::new(RedisRevocationList::new(manager.clone())),
                None => {
                    let list = Arc::new(InMemoryRevocationList::new(clock.clone()));
                    local_revocations = Some(list.clone());
                    list
                }
            };
            issuer = issuer.with_revocation(revocation);
        } else {
            tracing::info!("Session revocation disabled, logout only clears client cookies");
        }

        let gatekeeper = Arc::new(RequestGatekeeper::from_config(&config, limiter.clone())?);
        let throttle = Arc::new(LoginThrottle::new(
            attempt_store,
            LockoutPolicy::from_config(&config.auth),
            clock.clone(),
        ));
        let users = Arc::new(InMemoryUserDirectory::from_seed_users(
            &config.auth.seed_users,
        )?);
        let audit_logger = AuditLogger::from_config(audit_storage, &config.audit);

        Ok(Self {
            permissions: Arc::new(PermissionModel::standard()),
            issuer: Arc::new(issuer),
            throttle,
            limiter,
            gatekeeper,
            users,
            audit: AuditRecorder::new(clock.clone()),
            audit_logger,
            health_checker: Arc::new(HealthChecker::new(redis_manager)),
            local_revocations,
            clock,
            config: Arc::new(config),
        })
    }

    /// Cookies carry `Secure` only in production
    pub fn secure_cookies(&self) -> bool {
        self.issuer.secure_cookies()
    }

    /// Sweep stale entries out of the in-process stores
    pub async fn evict_expired(&self) -> Result<usize> {
        let mut evicted = self.throttle.evict_expired().await?;
        evicted += self.limiter.evict_expired().await?;
        if let Some(revocations) = &self.local_revocations {
            evicted += revocations.evict_expired();
        }
        Ok(evicted)
    }
}

pub fn create_router(state: AppState) -> Router {
    // Routes requiring a valid session
    let protected_routes: Router<AppState> = Router::new()
        .route("/api/auth/session", get(auth::session))
        .route(
            "/api/roles",
            get(roles::list_roles)
                .route_layer(require_permissions!(state.permissions.clone(), TEAM_VIEW)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.issuer.clone(),
            require_session,
        ));

    Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
        // Authentication endpoints (no session required)
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/verify", get(auth::verify))
        .merge(protected_routes)
        .fallback(not_found)
        // Every request, routed or not, passes the gatekeeper
        .layer(middleware::from_fn_with_state(
            state.gatekeeper.clone(),
            gatekeeper_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
