//! Handoff orchestration between the design tool (producer) and the print storefront (consumer).
//!
//! Per user/session pair the handoff moves `no token → authorization pending → authorized →
//! design requested → artifact ready → consumed`. A missing or revoked token is not an error
//! here: [`Handoff::create_design`] answers with [`DesignOutcome::NeedsAuthorization`] so the
//! caller can send the user through the redirect.

// crates.io
use axum::body::Bytes;
use tokio::time::MissedTickBehavior;
// self
use crate::{
	_prelude::*,
	auth::{SessionKey, UserKey},
	config::RelayConfig,
	design::{DesignClient, DesignSpec},
	flows::{Broker, ReqwestBroker, TokenUnavailable},
	http::ReqwestHttpClient,
	obs::{self, FlowKind, FlowSpan},
	relay::{ArtifactMetadata, ArtifactSource, ArtifactStore},
	store::{MemoryTokenStore, TokenStore},
};

/// Period of the background purge of expired artifacts and authorization states.
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Result of a design-creation request that did not hard-fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DesignOutcome {
	/// The design exists; the user continues at `edit_url`.
	Created {
		/// URL at which the user edits the design.
		edit_url: String,
	},
	/// No usable token; the user must authorize at `auth_url` first.
	NeedsAuthorization {
		/// Authorization server URL carrying state and PKCE challenge.
		auth_url: Url,
	},
}

/// Consumer-facing readiness of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
	/// An artifact is stored and retrievable at `url`.
	Ready {
		/// Public locator of the artifact.
		url: String,
	},
	/// Nothing is stored (yet, or any more).
	Pending,
}

/// Hard failures of handoff operations.
#[derive(Debug, ThisError)]
pub enum HandoffError {
	/// The request did not carry a usable user key.
	#[error("User key is missing.")]
	MissingUserKey,
	/// The OAuth subsystem is disabled in this deployment.
	#[error("Authorization is not configured.")]
	NotConfigured,
	/// The deposit listed no source files.
	#[error("No files were provided.")]
	NoFiles,
	/// An upstream call failed.
	#[error(transparent)]
	Upstream(#[from] Error),
}

/// Authorization and design creation; present only when the OAuth client is configured.
#[derive(Clone, Debug)]
pub struct Authorizer {
	/// Token Lifecycle Manager.
	pub broker: Arc<ReqwestBroker>,
	/// Design API client.
	pub design: DesignClient,
}

/// Coordinates the artifact store, the artifact source, and the token manager.
#[derive(Clone, Debug)]
pub struct Handoff {
	/// Session-keyed artifact store.
	pub artifacts: Arc<ArtifactStore>,
	/// Downloader for producer file URLs.
	pub source: ArtifactSource,
	/// OAuth-backed collaborators, when configured.
	pub authorizer: Option<Authorizer>,
	/// Whether a retrieval consumes the artifact.
	pub purge_on_fetch: bool,
}
impl Handoff {
	/// Creates a handoff without OAuth collaborators.
	pub fn new(artifacts: Arc<ArtifactStore>, source: ArtifactSource) -> Self {
		Self { artifacts, source, authorizer: None, purge_on_fetch: false }
	}

	/// Wires the stores and upstream clients described by `config`.
	///
	/// Without OAuth settings the handoff still relays artifacts, but design creation and
	/// authorization answer "not configured".
	pub fn from_config(config: &RelayConfig) -> Result<Self> {
		let artifacts =
			Arc::new(ArtifactStore::new(&config.base_public_url, config.artifact_retention));
		let handoff = Self::new(artifacts, ArtifactSource::with_timeout(config.upstream_timeout)?)
			.with_purge_on_fetch(config.purge_on_fetch);
		let Some(oauth) = &config.oauth else {
			tracing::warn!("OAuth client is not configured; design creation is disabled");

			return Ok(handoff);
		};
		let http_client = ReqwestHttpClient::new(config.upstream_timeout)?;
		let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::default());
		let design = DesignClient::new(http_client.0.clone(), &oauth.api_base, config.design_dpi);
		let mut broker: ReqwestBroker = Broker::with_http_client(
			store,
			oauth.descriptor()?,
			oauth.client_id.clone(),
			oauth.redirect_uri.clone(),
			http_client,
		);

		if let Some(secret) = &oauth.client_secret {
			broker = broker.with_client_secret(secret.clone());
		}

		Ok(handoff.with_authorizer(Arc::new(broker), design))
	}

	/// Attaches the token manager and design client.
	pub fn with_authorizer(mut self, broker: Arc<ReqwestBroker>, design: DesignClient) -> Self {
		self.authorizer = Some(Authorizer { broker, design });

		self
	}

	/// Switches retrieval to single-read semantics.
	pub fn with_purge_on_fetch(mut self, purge_on_fetch: bool) -> Self {
		self.purge_on_fetch = purge_on_fetch;

		self
	}

	/// Returns the configured token manager.
	pub fn broker(&self) -> Result<&ReqwestBroker, HandoffError> {
		self.authorizer.as_ref().map(|a| a.broker.as_ref()).ok_or(HandoffError::NotConfigured)
	}

	/// Creates a design for `user`, or asks for authorization when no valid token exists.
	///
	/// A 401 from the design API invalidates the cached token before asking for authorization.
	pub async fn create_design(
		&self,
		user: &UserKey,
		spec: &DesignSpec,
	) -> Result<DesignOutcome, HandoffError> {
		const KIND: FlowKind = FlowKind::DesignCreate;

		let authorizer = self.authorizer.as_ref().ok_or(HandoffError::NotConfigured)?;
		let span = FlowSpan::new(KIND, "create_design");
		let result = span
			.instrument(async move {
				let token = match authorizer.broker.get_valid_access_token(user).await {
					Ok(token) => token,
					Err(TokenUnavailable::MissingUserKey) => return Err(HandoffError::MissingUserKey),
					Err(_) => return Ok(self.needs_authorization(authorizer, user)),
				};

				match authorizer.design.create_design(&token, spec).await {
					Ok(design) => {
						tracing::info!(user = %user, design_id = ?design.id, "design created");

						Ok(DesignOutcome::Created { edit_url: design.edit_url })
					},
					Err(Error::Revoked) => {
						tracing::info!(user = %user, "design API rejected the access token");
						authorizer.broker.invalidate(user).await;

						Ok(self.needs_authorization(authorizer, user))
					},
					Err(e) => Err(HandoffError::Upstream(e)),
				}
			})
			.await;

		obs::record_result(KIND, result)
	}

	/// Downloads the first of `files` and stores it for `session`; returns the public locator.
	pub async fn deposit_from_sources(
		&self,
		session: &SessionKey,
		files: &[Url],
		title: Option<String>,
	) -> Result<String, HandoffError> {
		const KIND: FlowKind = FlowKind::ArtifactDeposit;

		let first = files.first().ok_or(HandoffError::NoFiles)?;
		let span = FlowSpan::new(KIND, "deposit_from_sources");
		let result = span
			.instrument(async move {
				let payload = self.source.download(first).await?;

				Ok::<_, HandoffError>(self.artifacts.put(
					session,
					payload,
					ArtifactMetadata { title, filename: None },
				))
			})
			.await;

		obs::record_result(KIND, result)
	}

	/// Stores already-decoded bytes for `session`; returns the public locator.
	pub fn deposit_inline(
		&self,
		session: &SessionKey,
		payload: Bytes,
		filename: Option<String>,
	) -> String {
		let locator = self.artifacts.put(session, payload, ArtifactMetadata { title: None, filename });

		obs::record_flow_outcome(FlowKind::ArtifactDeposit, obs::FlowOutcome::Success);

		locator
	}

	/// Reports whether an artifact is ready for `session`.
	pub fn poll(&self, session: &str) -> Readiness {
		match self.artifacts.peek(session) {
			Some(record) => Readiness::Ready { url: record.public_locator },
			None => Readiness::Pending,
		}
	}

	/// Returns the artifact bytes for `session`, consuming them in single-read deployments.
	pub fn retrieve(&self, session: &str) -> Option<Bytes> {
		if self.purge_on_fetch {
			self.artifacts.take(session)
		} else {
			self.artifacts.peek(session).map(|record| record.payload)
		}
	}

	/// Consumer acknowledgment; idempotent.
	pub fn clear(&self, session: &str) {
		self.artifacts.clear(session);
	}

	/// Purges expired artifacts and stale authorization states.
	pub fn sweep(&self, now: OffsetDateTime) {
		let artifacts = self.artifacts.purge_expired(now);
		let states = self.authorizer.as_ref().map_or(0, |a| a.broker.pending.purge_expired(now));

		if artifacts > 0 || states > 0 {
			tracing::debug!(artifacts, states, "expired entries purged");
		}
	}

	fn needs_authorization(&self, authorizer: &Authorizer, user: &UserKey) -> DesignOutcome {
		let redirect = authorizer.broker.begin_authorization(user);

		DesignOutcome::NeedsAuthorization { auth_url: redirect.authorize_url }
	}
}

/// Runs [`Handoff::sweep`] every `period` until the task is dropped.
pub async fn sweep_periodically(handoff: Arc<Handoff>, period: StdDuration) {
	let mut interval = tokio::time::interval(period);

	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		interval.tick().await;
		handoff.sweep(OffsetDateTime::now_utc());
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn handoff(purge_on_fetch: bool) -> Handoff {
		let artifacts = Arc::new(ArtifactStore::new(
			&Url::parse("https://relay.example.com").expect("Base URL fixture should parse."),
			ArtifactStore::DEFAULT_RETENTION,
		));

		Handoff::new(artifacts, ArtifactSource::new(test_reqwest_client()))
			.with_purge_on_fetch(purge_on_fetch)
	}

	fn session(value: &str) -> SessionKey {
		SessionKey::new(value).expect("Session fixture should be valid.")
	}

	#[test]
	fn poll_retrieve_clear_cycle() {
		let handoff = handoff(false);
		let url = handoff.deposit_inline(&session("abc"), Bytes::from_static(b"%PDF"), None);

		assert_eq!(url, "https://relay.example.com/files/abc.pdf");
		assert_eq!(handoff.poll("abc"), Readiness::Ready { url });
		assert_eq!(handoff.retrieve("abc").as_deref(), Some(&b"%PDF"[..]));
		assert!(handoff.retrieve("abc").is_some(), "Peek retrieval must not consume.");

		handoff.clear("abc");

		assert_eq!(handoff.poll("abc"), Readiness::Pending);
	}

	#[test]
	fn purge_on_fetch_consumes() {
		let handoff = handoff(true);

		handoff.deposit_inline(&session("abc"), Bytes::from_static(b"%PDF"), None);

		assert!(handoff.retrieve("abc").is_some());
		assert!(handoff.retrieve("abc").is_none());
	}

	#[tokio::test]
	async fn deposit_without_files_fails() {
		let err = handoff(false)
			.deposit_from_sources(&session("abc"), &[], None)
			.await
			.expect_err("Empty file list must be rejected.");

		assert!(matches!(err, HandoffError::NoFiles));
	}

	#[tokio::test]
	async fn design_without_authorizer_is_not_configured() {
		let user = UserKey::new("u1").expect("User fixture should be valid.");
		let spec = DesignSpec { width_mm: 210., height_mm: 297., title: None };
		let err = handoff(false)
			.create_design(&user, &spec)
			.await
			.expect_err("Unconfigured handoff must fail.");

		assert!(matches!(err, HandoffError::NotConfigured));
	}
}
