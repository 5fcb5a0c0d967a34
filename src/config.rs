//! Process configuration loaded from environment variables.

// std
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
// crates.io
use axum::http::HeaderValue;
// self
use crate::{
	_prelude::*,
	design::DEFAULT_DPI,
	error::ConfigError,
	http::DEFAULT_UPSTREAM_TIMEOUT,
	obs::LogFormat,
	provider::{ClientAuthMethod, ProviderDescriptor},
	relay::ArtifactStore,
};

const DEFAULT_PORT: u16 = 10_000;
const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;
const DEFAULT_COOKIE_NAME: &str = "relay_session";
const DEFAULT_COOKIE_TTL_MINUTES: i64 = 120;
const MIN_COOKIE_TTL_MINUTES: i64 = 30;
const MAX_COOKIE_TTL_MINUTES: i64 = 240;
const DEFAULT_AUTH_URL: &str = "https://www.canva.com/api/oauth/authorize";
const DEFAULT_TOKEN_URL: &str = "https://api.canva.com/rest/v1/oauth/token";
const DEFAULT_API_BASE: &str = "https://api.canva.com/rest";
const DEFAULT_SCOPES: &str = "design:content:write design:meta:read";

/// How producers and consumers address a handoff session. One mode per deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionMode {
	/// Callers pass `sessionId` explicitly.
	#[default]
	Explicit,
	/// The relay mints a random key and keeps it in a cookie.
	Cookie,
}
impl FromStr for SessionMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"explicit" => Ok(Self::Explicit),
			"cookie" => Ok(Self::Cookie),
			other => Err(format!("expected `explicit` or `cookie`, got `{other}`")),
		}
	}
}

/// Cookie addressing settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
	/// Addressing mode.
	pub mode: SessionMode,
	/// Name of the session cookie.
	pub cookie_name: String,
	/// Cookie lifetime, clamped to 30 minutes through 4 hours.
	pub cookie_ttl: Duration,
}
impl Default for SessionSettings {
	fn default() -> Self {
		Self {
			mode: SessionMode::default(),
			cookie_name: DEFAULT_COOKIE_NAME.into(),
			cookie_ttl: Duration::minutes(DEFAULT_COOKIE_TTL_MINUTES),
		}
	}
}

/// OAuth client registration with the design tool.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSettings {
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret; public PKCE-only clients leave it unset.
	pub client_secret: Option<String>,
	/// Registered callback URL.
	pub redirect_uri: Url,
	/// Authorization endpoint.
	pub auth_url: Url,
	/// Token endpoint.
	pub token_url: Url,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Base URL of the design API.
	pub api_base: Url,
}
impl OAuthSettings {
	/// Builds the validated authorization server descriptor.
	pub fn descriptor(&self) -> Result<ProviderDescriptor, ConfigError> {
		let method = if self.client_secret.is_some() {
			ClientAuthMethod::ClientSecretBasic
		} else {
			ClientAuthMethod::NoneWithPkce
		};

		ProviderDescriptor::builder()
			.authorization_endpoint(self.auth_url.clone())
			.token_endpoint(self.token_url.clone())
			.scopes(self.scopes.iter().map(String::as_str))
			.preferred_client_auth_method(method)
			.build()
			.map_err(|e| ConfigError::invalid_setting("CANVA_AUTH_URL/CANVA_TOKEN_URL", e))
	}
}
impl Debug for OAuthSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthSettings")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.field("auth_url", &self.auth_url)
			.field("token_url", &self.token_url)
			.field("scopes", &self.scopes)
			.field("api_base", &self.api_base)
			.finish()
	}
}

/// Complete relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
	/// Socket the HTTP server binds to.
	pub listen: SocketAddr,
	/// Base URL prefixed to public artifact locators.
	pub base_public_url: Url,
	/// Session addressing.
	pub session: SessionSettings,
	/// Artifact retention window.
	pub artifact_retention: Duration,
	/// Whether a retrieval consumes the artifact.
	pub purge_on_fetch: bool,
	/// Maximum accepted request body size in bytes.
	pub body_limit_bytes: usize,
	/// Timeout applied to every outbound call.
	pub upstream_timeout: StdDuration,
	/// OAuth client registration; `None` disables authorization and design creation.
	pub oauth: Option<OAuthSettings>,
	/// Resolution used for mm→px conversion.
	pub design_dpi: u32,
	/// Explicit CORS allow-list; empty mirrors the request origin.
	pub cors_allowed_origins: Vec<HeaderValue>,
	/// Subscriber output format.
	pub log_format: LogFormat,
}
impl RelayConfig {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`; blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
		let bind_addr = parse_or(get("BIND_ADDR"), "BIND_ADDR", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
		let base_public_url = match get("BASE_PUBLIC_URL") {
			Some(raw) => parse_url("BASE_PUBLIC_URL", &raw)?,
			None => parse_url("BASE_PUBLIC_URL", &format!("http://localhost:{port}"))?,
		};
		let cookie_ttl_minutes: i64 = parse_or(
			get("SESSION_COOKIE_TTL_MINUTES"),
			"SESSION_COOKIE_TTL_MINUTES",
			DEFAULT_COOKIE_TTL_MINUTES,
		)?;
		let session = SessionSettings {
			mode: parse_or(get("SESSION_MODE"), "SESSION_MODE", SessionMode::default())?,
			cookie_name: get("SESSION_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.into()),
			cookie_ttl: Duration::minutes(
				cookie_ttl_minutes.clamp(MIN_COOKIE_TTL_MINUTES, MAX_COOKIE_TTL_MINUTES),
			),
		};
		let retention_minutes: i64 = parse_or(
			get("ARTIFACT_RETENTION_MINUTES"),
			"ARTIFACT_RETENTION_MINUTES",
			ArtifactStore::DEFAULT_RETENTION.whole_minutes(),
		)?;

		if retention_minutes <= 0 {
			return Err(ConfigError::invalid_setting("ARTIFACT_RETENTION_MINUTES", "must be positive"));
		}

		let timeout_secs: u64 = parse_or(
			get("UPSTREAM_TIMEOUT_SECS"),
			"UPSTREAM_TIMEOUT_SECS",
			DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
		)?;

		if timeout_secs == 0 {
			return Err(ConfigError::invalid_setting("UPSTREAM_TIMEOUT_SECS", "must be positive"));
		}

		let design_dpi = parse_or(get("DESIGN_DPI"), "DESIGN_DPI", DEFAULT_DPI)?;

		if design_dpi == 0 {
			return Err(ConfigError::invalid_setting("DESIGN_DPI", "must be positive"));
		}

		let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
			.map(|raw| {
				split_list(&raw)
					.map(|origin| {
						HeaderValue::from_str(origin)
							.map_err(|e| ConfigError::invalid_setting("CORS_ALLOWED_ORIGINS", e))
					})
					.collect::<Result<Vec<_>, _>>()
			})
			.transpose()?
			.unwrap_or_default();

		Ok(Self {
			listen: SocketAddr::new(bind_addr, port),
			base_public_url,
			session,
			artifact_retention: Duration::minutes(retention_minutes),
			purge_on_fetch: parse_flag(get("PURGE_ON_FETCH"), "PURGE_ON_FETCH")?,
			body_limit_bytes: parse_or(get("BODY_LIMIT_BYTES"), "BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?,
			upstream_timeout: StdDuration::from_secs(timeout_secs),
			oauth: oauth_settings(&get)?,
			design_dpi,
			cors_allowed_origins,
			log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::default())?,
		})
	}
}

fn oauth_settings<F>(get: &F) -> Result<Option<OAuthSettings>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let (Some(client_id), Some(redirect_uri)) = (get("CANVA_CLIENT_ID"), get("CANVA_REDIRECT_URI"))
	else {
		return Ok(None);
	};
	let url_or = |name: &'static str, default: &str| match get(name) {
		Some(raw) => parse_url(name, &raw),
		None => parse_url(name, default),
	};

	Ok(Some(OAuthSettings {
		client_id,
		client_secret: get("CANVA_CLIENT_SECRET"),
		redirect_uri: parse_url("CANVA_REDIRECT_URI", &redirect_uri)?,
		auth_url: url_or("CANVA_AUTH_URL", DEFAULT_AUTH_URL)?,
		token_url: url_or("CANVA_TOKEN_URL", DEFAULT_TOKEN_URL)?,
		scopes: split_list(&get("CANVA_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.into()))
			.map(str::to_owned)
			.collect(),
		api_base: url_or("CANVA_API_BASE", DEFAULT_API_BASE)?,
	}))
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	match raw {
		Some(raw) => raw.parse().map_err(|e| ConfigError::invalid_setting(name, e)),
		None => Ok(default),
	}
}

fn parse_flag(raw: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
	match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
		None => Ok(false),
		Some("1" | "true" | "yes" | "on") => Ok(true),
		Some("0" | "false" | "no" | "off") => Ok(false),
		Some(other) => Err(ConfigError::invalid_setting(name, format!("`{other}` is not a boolean"))),
	}
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|e| ConfigError::invalid_setting(name, e))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
	raw.split([',', ' ']).map(str::trim).filter(|item| !item.is_empty())
}
