//! Single-use store for authorization states awaiting their callback.

// self
use crate::{
	_prelude::*,
	auth::{StateToken, TokenSecret, UserKey},
};

/// State persisted between the authorization redirect and its callback.
#[derive(Clone, Debug)]
pub struct PendingAuthorization {
	/// User on whose behalf authorization was requested.
	pub user: UserKey,
	/// PKCE secret generated for this flow.
	pub code_verifier: TokenSecret,
	/// Instant the redirect was issued.
	pub created_at: OffsetDateTime,
}

/// Keyed by state token; every entry is consumed at most once.
#[derive(Debug)]
pub struct PendingAuthorizations {
	entries: Mutex<HashMap<StateToken, PendingAuthorization>>,
	ttl: Duration,
}
impl PendingAuthorizations {
	/// How long a never-completed flow stays redeemable unless overridden.
	pub const DEFAULT_TTL: Duration = Duration::minutes(10);

	/// Creates an empty store whose entries expire after `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { entries: Default::default(), ttl }
	}

	/// Stores the pending flow under its state token.
	pub fn insert(&self, state: StateToken, pending: PendingAuthorization) {
		self.entries.lock().insert(state, pending);
	}

	/// Removes and returns the entry for `state` unless it is older than the time-to-live.
	///
	/// Expired entries are removed as well, so a second call always yields `None`.
	pub fn take_at(&self, state: &str, now: OffsetDateTime) -> Option<PendingAuthorization> {
		let pending = self.entries.lock().remove(state)?;

		if now - pending.created_at > self.ttl { None } else { Some(pending) }
	}

	/// Drops every entry older than the time-to-live and returns how many were removed.
	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut entries = self.entries.lock();
		let before = entries.len();

		entries.retain(|_, pending| now - pending.created_at <= self.ttl);

		before - entries.len()
	}

	/// Number of flows awaiting their callback.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when no flow is pending.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}
impl Default for PendingAuthorizations {
	fn default() -> Self {
		Self::new(Self::DEFAULT_TTL)
	}
}
