//! Authorization Code + PKCE: redirect construction and callback completion.
//!
//! [`Broker::begin_authorization`] mints a state token and PKCE pair, remembers the verifier
//! in [`PendingAuthorizations`], and returns the authorize URL. [`Broker::complete_authorization`]
//! consumes the state exactly once, redeems the code, and caches the resulting tokens.

mod pending;
mod session;

pub use pending::*;
pub use session::{AuthorizationRedirect, PkceCodeChallengeMethod};

// self
use crate::{
	_prelude::*,
	auth::{StateToken, TokenRecord, UserKey},
	flows::Broker,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
use session::PkcePair;

/// Reasons an authorization callback could not be completed.
#[derive(Debug, ThisError)]
pub enum AuthorizationError {
	/// `code` or `state` was absent or blank.
	#[error("Authorization callback is missing code or state.")]
	MissingParams,
	/// The state is unknown, already used, or older than its time-to-live.
	#[error("Authorization state is invalid or expired.")]
	InvalidOrExpiredState,
	/// The pending entry for the state is unusable.
	#[error("Authorization state payload is invalid.")]
	InvalidStatePayload,
	/// Token endpoint exchange or token persistence failed.
	#[error("Authorization code exchange failed.")]
	ExchangeFailed(#[source] Error),
}
impl AuthorizationError {
	/// Stable machine-readable reason surfaced to callers.
	pub const fn reason(&self) -> &'static str {
		match self {
			AuthorizationError::MissingParams => "missing_params",
			AuthorizationError::InvalidOrExpiredState => "invalid_or_expired_state",
			AuthorizationError::InvalidStatePayload => "invalid_state_payload",
			AuthorizationError::ExchangeFailed(_) => "exchange_failed",
		}
	}
}

impl<C> Broker<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Starts an authorization flow on behalf of `user`.
	///
	/// The returned state is single-use and stays redeemable for the pending store's
	/// time-to-live.
	pub fn begin_authorization(&self, user: &UserKey) -> AuthorizationRedirect {
		let state = StateToken::generate();
		let pkce = PkcePair::generate();
		let authorize_url = session::build_authorize_url(
			&self.descriptor,
			&self.client_id,
			&self.redirect_uri,
			&state,
			&pkce,
		);

		self.pending.insert(
			state.clone(),
			PendingAuthorization {
				user: user.clone(),
				code_verifier: pkce.verifier,
				created_at: OffsetDateTime::now_utc(),
			},
		);
		obs::record_flow_outcome(FlowKind::AuthorizationCode, FlowOutcome::Attempt);
		tracing::debug!(user = %user, "authorization redirect issued");

		AuthorizationRedirect { state, authorize_url }
	}

	/// Completes an authorization flow from the callback's `code` and `state` parameters.
	///
	/// On success the issued tokens are stored for the user that started the flow and the
	/// record is returned.
	pub async fn complete_authorization(
		&self,
		code: Option<&str>,
		state: Option<&str>,
	) -> Result<TokenRecord, AuthorizationError> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "complete_authorization");
		let result = span
			.instrument(async move {
				let (code, state) = match (non_blank(code), non_blank(state)) {
					(Some(code), Some(state)) => (code, state),
					_ => return Err(AuthorizationError::MissingParams),
				};
				let pending = self
					.pending
					.take_at(state, OffsetDateTime::now_utc())
					.ok_or(AuthorizationError::InvalidOrExpiredState)?;

				if !session::is_valid_verifier(pending.code_verifier.expose()) {
					return Err(AuthorizationError::InvalidStatePayload);
				}

				let facade = self.facade().map_err(AuthorizationError::ExchangeFailed)?;
				let record = facade
					.exchange_authorization_code(
						pending.user.clone(),
						code,
						pending.code_verifier.expose(),
						&self.redirect_uri,
					)
					.await
					.map_err(AuthorizationError::ExchangeFailed)?;

				self.store
					.save(record.clone())
					.await
					.map_err(|e| AuthorizationError::ExchangeFailed(e.into()))?;

				tracing::info!(user = %record.user, "authorization completed");

				Ok(record)
			})
			.await;

		if let Err(e) = &result {
			tracing::warn!(reason = e.reason(), error = %e, "authorization callback rejected");
		}

		obs::record_result(KIND, result)
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|view| !view.is_empty())
}
