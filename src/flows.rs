//! Token Lifecycle Manager: authorization redirect + callback, cached token lookup with
//! transparent refresh, and invalidation on revocation.

pub mod auth_code_pkce;
pub mod refresh;

pub use auth_code_pkce::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::OAuthFacade,
	provider::ProviderDescriptor,
	store::TokenStore,
};

/// Broker specialized for the crate's reqwest transport.
pub type ReqwestBroker = Broker<ReqwestHttpClient>;

/// Coordinates the OAuth 2.0 token lifecycle against a single authorization server.
///
/// The broker owns the HTTP client, the token store, and the pending-authorization store.
/// Stores are injected so tests can inspect them and a durable backend can be swapped in
/// without touching the flows. No lock is held across a token endpoint call.
pub struct Broker<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// HTTP client wrapper used for every token endpoint request.
	pub http_client: Arc<C>,
	/// Token store keyed by user.
	pub store: Arc<dyn TokenStore>,
	/// Single-use authorization states awaiting their callback.
	pub pending: Arc<PendingAuthorizations>,
	/// Authorization server descriptor.
	pub descriptor: ProviderDescriptor,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Optional client secret for confidential authentication methods.
	pub client_secret: Option<String>,
	/// Redirect URI registered with the authorization server.
	pub redirect_uri: Url,
	/// Lead time before expiry at which a cached token is refreshed.
	pub safety_margin: Duration,
	/// Counters for token lookups and refresh calls.
	pub refresh_metrics: Arc<RefreshMetrics>,
}
impl<C> Broker<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Lead time applied before `expires_at` unless overridden.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(60);

	/// Creates a broker that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_uri: Url,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			pending: Default::default(),
			descriptor,
			client_id: client_id.into(),
			client_secret: None,
			redirect_uri,
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			refresh_metrics: Default::default(),
		}
	}

	/// Sets or replaces the client secret used for confidential client auth modes.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the refresh safety margin; negative values are clamped to zero.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Replaces the pending-authorization store (e.g. to change its time-to-live).
	pub fn with_pending_store(mut self, pending: Arc<PendingAuthorizations>) -> Self {
		self.pending = pending;

		self
	}

	pub(crate) fn facade(&self) -> Result<OAuthFacade<C>> {
		OAuthFacade::from_descriptor(
			&self.descriptor,
			&self.client_id,
			self.client_secret.as_deref(),
			self.http_client.clone(),
		)
	}
}
impl Broker<ReqwestHttpClient> {
	/// Creates a broker with its own reqwest transport using the provided timeout.
	pub fn new(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_uri: Url,
		timeout: StdDuration,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::new(timeout)?;

		Ok(Self::with_http_client(store, descriptor, client_id, redirect_uri, http_client))
	}
}
impl<C> Debug for Broker<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.field("safety_margin", &self.safety_margin)
			.finish()
	}
}
