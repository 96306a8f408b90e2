//! Application state and router assembly.

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use rim_directory::{ContactRepository, DirectoryService, GroupRepository, MemoryDirectory};
use rim_platform_access::{
    AdminGroup, Authenticator, AuthorizationGate, DirectoryLookup, MemorySessionStore,
    MemorySettings, MemoryUserRepository, SessionManager, SessionPolicy, SessionStore,
    SettingsRepository, SystemSettings, TelegramVerifier, UserRepository,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{auth, directory, system};

/// `X-CSRF-Token`, in the lowercase form header names are built from.
const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// The storage the application runs on.
#[derive(Clone)]
pub struct Backends {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub groups: Arc<dyn GroupRepository>,
    /// The contact store again, seen from the access layer.
    pub lookup: Arc<dyn DirectoryLookup>,
}

impl Backends {
    /// Process-local stores, for tests and local experiments.
    #[must_use]
    pub fn in_memory() -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        Self {
            sessions: Arc::new(MemorySessionStore::new()),
            users: Arc::new(MemoryUserRepository::new()),
            settings: Arc::new(MemorySettings::new()),
            contacts: directory.clone(),
            groups: directory.clone(),
            lookup: directory,
        }
    }
}

/// Access-control settings taken from configuration.
#[derive(Clone)]
pub struct AccessOptions {
    pub bot_token: String,
    pub force_debug: bool,
    pub admin_group: AdminGroup,
    pub policy: SessionPolicy,
    pub secure_cookies: bool,
}

/// Shared application state.
pub struct AppState {
    pub auth: Authenticator,
    pub gate: AuthorizationGate,
    pub system: SystemSettings,
    pub directory: DirectoryService,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

impl AppState {
    /// Wires the services over the given stores.
    #[must_use]
    pub fn new(backends: Backends, options: AccessOptions) -> Self {
        let sessions = SessionManager::new(
            backends.sessions,
            backends.users.clone(),
            options.policy,
        );
        let system = SystemSettings::new(backends.settings, options.force_debug);
        let gate = AuthorizationGate::new(
            backends.users.clone(),
            backends.lookup.clone(),
            Arc::new(system.clone()),
            options.admin_group,
        );
        let auth = Authenticator::new(
            TelegramVerifier::new(&options.bot_token),
            backends.users,
            backends.lookup,
            sessions,
        );

        Self {
            auth,
            gate,
            system,
            directory: DirectoryService::new(backends.contacts, backends.groups),
            secure_cookies: options.secure_cookies,
        }
    }
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/telegram", post(auth::routes::telegram))
        .route("/auth/me", get(auth::routes::me))
        .route("/auth/logout", post(auth::routes::logout))
        .route("/auth/csrf-token", get(auth::routes::csrf_token))
        .route("/auth/contact", put(auth::routes::update_my_contact))
        // System
        .route(
            "/system/debug-mode",
            get(system::debug_mode).put(system::set_debug_mode),
        )
        // Contacts
        .route(
            "/contacts",
            get(directory::list_contacts).post(directory::create_contact),
        )
        .route(
            "/contacts/{id}",
            get(directory::get_contact)
                .put(directory::update_contact)
                .delete(directory::delete_contact),
        )
        .route(
            "/contacts/{id}/groups/{group_id}",
            post(directory::add_to_group).delete(directory::remove_from_group),
        )
        // Groups
        .route(
            "/groups",
            get(directory::list_groups).post(directory::create_group),
        )
        .route(
            "/groups/{id}",
            get(directory::get_group)
                .put(directory::rename_group)
                .delete(directory::delete_group),
        )
}

/// Builds the HTTP router with CSRF, security headers, CORS and tracing.
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .layer(middleware::from_fn(auth::csrf::enforce))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; script-src 'self' https://telegram.org; \
                 frame-src https://oauth.telegram.org; frame-ancestors 'none'",
            ),
        ))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static(CSRF_HEADER_NAME),
        ])
        .allow_credentials(true)
}
