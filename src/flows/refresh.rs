//! Cached access-token lookup with transparent refresh and revocation handling.
//!
//! [`Broker::get_valid_access_token`] returns the cached token while it is outside the safety
//! margin. Inside the margin it redeems the stored refresh token once and rotates the record
//! via [`compare_and_swap_refresh`](crate::store::TokenStore::compare_and_swap_refresh).
//! Any failure removes the record so the caller is sent back through authorization instead of
//! retrying a token the relay cannot vouch for.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, UserKey},
	flows::Broker,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowSpan},
	store::CompareAndSwapOutcome,
};

/// Reasons [`Broker::get_valid_access_token`] could not produce a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum TokenUnavailable {
	/// No usable user key was supplied.
	#[error("User key is missing.")]
	MissingUserKey,
	/// Nothing is cached for the user.
	#[error("No token is cached for the user.")]
	NoToken,
	/// The cached token expired and cannot be refreshed.
	#[error("The cached token has no refresh token.")]
	NoRefreshToken,
	/// The refresh call failed; the cached record was discarded.
	#[error("Refreshing the access token failed.")]
	RefreshFailed,
}
impl TokenUnavailable {
	/// Stable machine-readable reason surfaced to callers.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenUnavailable::MissingUserKey => "missing_user_key",
			TokenUnavailable::NoToken => "no_token",
			TokenUnavailable::NoRefreshToken => "no_refresh_token",
			TokenUnavailable::RefreshFailed => "refresh_failed",
		}
	}
}

impl<C> Broker<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Returns an access token for `user` that is valid for at least the safety margin.
	///
	/// Blank or malformed keys yield [`TokenUnavailable::MissingUserKey`].
	pub async fn get_valid_access_token(&self, user: &str) -> Result<TokenSecret, TokenUnavailable> {
		const KIND: FlowKind = FlowKind::Refresh;

		let Ok(Some(user)) = UserKey::from_optional(Some(user)) else {
			return Err(TokenUnavailable::MissingUserKey);
		};
		let span = FlowSpan::new(KIND, "get_valid_access_token");

		self.refresh_metrics.record_lookup();

		let result = span.instrument(self.lookup_or_refresh(user)).await;

		if let Err(reason) = &result {
			self.refresh_metrics.record_failure();
			tracing::info!(reason = reason.as_str(), "access token unavailable");
		}

		obs::record_result(KIND, result)
	}

	/// Drops the cached record for `user`; used when a downstream API reports revocation.
	pub async fn invalidate(&self, user: &UserKey) {
		match self.store.remove(user).await {
			Ok(Some(_)) => tracing::info!(user = %user, "token record invalidated"),
			Ok(None) => {},
			Err(e) => tracing::error!(user = %user, error = %e, "failed to invalidate token record"),
		}
	}

	async fn lookup_or_refresh(&self, user: UserKey) -> Result<TokenSecret, TokenUnavailable> {
		let current = match self.store.fetch(&user).await {
			Ok(Some(record)) => record,
			Ok(None) => return Err(TokenUnavailable::NoToken),
			Err(e) => {
				tracing::error!(user = %user, error = %e, "token store lookup failed");

				return Err(TokenUnavailable::NoToken);
			},
		};

		if !current.expires_within(OffsetDateTime::now_utc(), self.safety_margin) {
			return Ok(current.access_token);
		}

		let Some(expected_refresh) = current.refresh_token.as_ref().map(|s| s.expose().to_owned())
		else {
			self.invalidate(&user).await;

			return Err(TokenUnavailable::NoRefreshToken);
		};

		self.refresh_metrics.record_refresh();

		let refreshed = match self.redeem_refresh(&user, &expected_refresh).await {
			Ok(record) => record,
			Err(e) => {
				tracing::warn!(user = %user, error = %e, "refresh token exchange failed");
				self.invalidate(&user).await;

				return Err(TokenUnavailable::RefreshFailed);
			},
		};

		self.store_refreshed(&user, &expected_refresh, refreshed).await.map(|record| record.access_token)
	}

	async fn redeem_refresh(&self, user: &UserKey, refresh_token: &str) -> Result<TokenRecord> {
		self.facade()?.refresh_token(user.clone(), refresh_token).await
	}

	async fn store_refreshed(
		&self,
		user: &UserKey,
		expected_refresh: &str,
		refreshed: TokenRecord,
	) -> Result<TokenRecord, TokenUnavailable> {
		let outcome = self
			.store
			.compare_and_swap_refresh(user, Some(expected_refresh), refreshed.clone())
			.await
			.map_err(|e| store_failure(user, e.into()))?;

		match outcome {
			CompareAndSwapOutcome::Updated => Ok(refreshed),
			CompareAndSwapOutcome::Missing => {
				self.store.save(refreshed.clone()).await.map_err(|e| store_failure(user, e.into()))?;

				Ok(refreshed)
			},
			// A concurrent lookup already rotated the record; keep the winner.
			CompareAndSwapOutcome::RefreshMismatch => match self.store.fetch(user).await {
				Ok(Some(existing)) => Ok(existing),
				Ok(None) => Err(TokenUnavailable::RefreshFailed),
				Err(e) => Err(store_failure(user, e.into())),
			},
		}
	}
}

fn store_failure(user: &UserKey, error: Error) -> TokenUnavailable {
	tracing::error!(user = %user, error = %error, "failed to persist refreshed token");

	TokenUnavailable::RefreshFailed
}
