//! HTTP surface: axum router over [`Handoff`].
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /health` | health check |
//! | `POST /canva/export` | deposit by download |
//! | `POST /pressero/upload` | inline base64 deposit |
//! | `GET /pressero/ready` | readiness poll |
//! | `GET /files/{sessionId}.pdf` | artifact retrieval |
//! | `POST /pressero/clear` | consumer acknowledgment |
//! | `GET /auth/start` | begin authorization |
//! | `GET /auth/callback` | authorization callback |
//! | `POST /canva/design` | design creation |

pub mod error;
pub mod session;
pub mod types;

mod routes;

pub use error::ApiError;

// crates.io
use axum::{
	Router,
	extract::DefaultBodyLimit,
	http::{HeaderValue, Method, header},
	routing::{get, post},
};
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	trace::TraceLayer,
};
// self
use crate::{
	_prelude::*,
	config::{RelayConfig, SessionMode, SessionSettings},
	handoff::Handoff,
};

const CORS_MAX_AGE: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Orchestrator over the relay store and the token manager.
	pub handoff: Arc<Handoff>,
	/// Session addressing.
	pub session: Arc<SessionSettings>,
}
impl AppState {
	/// Bundles the handoff with its session settings.
	pub fn new(handoff: Handoff, session: SessionSettings) -> Self {
		Self { handoff: Arc::new(handoff), session: Arc::new(session) }
	}
}

/// Layers applied around the routes.
#[derive(Clone, Debug)]
pub struct HttpSettings {
	/// Maximum accepted request body in bytes.
	pub body_limit_bytes: usize,
	/// Explicit CORS allow-list; empty mirrors the request origin.
	pub cors_allowed_origins: Vec<HeaderValue>,
}
impl HttpSettings {
	/// Extracts the layer settings from the process configuration.
	pub fn from_config(config: &RelayConfig) -> Self {
		Self {
			body_limit_bytes: config.body_limit_bytes,
			cors_allowed_origins: config.cors_allowed_origins.clone(),
		}
	}
}
impl Default for HttpSettings {
	fn default() -> Self {
		Self { body_limit_bytes: 20 * 1024 * 1024, cors_allowed_origins: Vec::new() }
	}
}

/// Builds the relay router.
pub fn router(state: AppState, settings: &HttpSettings) -> Router {
	let cors = cors_layer(settings, state.session.mode);

	Router::new()
		.route("/health", get(routes::health))
		.route("/canva/export", post(routes::export))
		.route("/canva/design", post(routes::design))
		.route("/pressero/upload", post(routes::upload))
		.route("/pressero/ready", get(routes::ready))
		.route("/pressero/clear", post(routes::clear))
		.route("/files/{file}", get(routes::file))
		.route("/auth/start", get(routes::auth_start))
		.route("/auth/callback", get(routes::auth_callback))
		.layer(DefaultBodyLimit::max(settings.body_limit_bytes))
		.layer(cors)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

fn cors_layer(settings: &HttpSettings, mode: SessionMode) -> CorsLayer {
	let origin = if settings.cors_allowed_origins.is_empty() {
		AllowOrigin::mirror_request()
	} else {
		AllowOrigin::list(settings.cors_allowed_origins.iter().cloned())
	};

	CorsLayer::new()
		.allow_origin(origin)
		.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
		.allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
		.allow_credentials(matches!(mode, SessionMode::Cookie))
		.max_age(CORS_MAX_AGE)
}
