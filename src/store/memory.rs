//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, UserKey},
	store::{CompareAndSwapOutcome, StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<UserKey, TokenRecord>>>;

/// Process-local token store; records vanish when the process exits.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(StoreMap);
impl MemoryTokenStore {
	/// Number of users with a cached record.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no record is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, record: TokenRecord) -> Result<(), StoreError> {
		map.write().insert(record.user.clone(), record);

		Ok(())
	}

	fn fetch_now(map: StoreMap, user: &UserKey) -> Option<TokenRecord> {
		map.read().get(user).cloned()
	}

	fn cas_now(
		map: StoreMap,
		user: &UserKey,
		expected_refresh: Option<&str>,
		replacement: TokenRecord,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = match guard.get(user) {
			Some(existing)
				if Self::refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(user.clone(), replacement);
		}

		outcome
	}

	fn refresh_matches(current: Option<&TokenSecret>, expected: Option<&str>) -> bool {
		match (current.map(TokenSecret::expose), expected) {
			(None, None) => true,
			(Some(cur), Some(exp)) => cur == exp,
			_ => false,
		}
	}

	fn remove_now(map: StoreMap, user: &UserKey) -> Option<TokenRecord> {
		map.write().remove(user)
	}
}
impl TokenStore for MemoryTokenStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch<'a>(&'a self, user: &'a UserKey) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::fetch_now(map, user)) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		user: &'a UserKey,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, user, expected_refresh, replacement)) })
	}

	fn remove<'a>(&'a self, user: &'a UserKey) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::remove_now(map, user)) })
	}
}
