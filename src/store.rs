//! Storage contract and the in-memory implementation for per-user token records.

pub mod memory;

pub use memory::MemoryTokenStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserKey},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for token records keyed by user.
///
/// Every operation is a single read-modify-write step against the backend; implementations
/// must never hold their own lock across an `.await` so a slow caller cannot stall others.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record for `record.user`.
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record associated with the user, if present.
	fn fetch<'a>(&'a self, user: &'a UserKey) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Atomically replaces a record if its refresh secret still matches `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		user: &'a UserKey,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Deletes the record for the user, returning it when one existed.
	fn remove<'a>(&'a self, user: &'a UserKey) -> StoreFuture<'a, Option<TokenRecord>>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the record was updated.
	Updated,
	/// The record exists but the expected refresh secret did not match.
	RefreshMismatch,
	/// No record exists for the user.
	Missing,
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
