// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token lookups and refresh calls.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	lookups: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of token lookups.
	pub fn lookups(&self) -> u64 {
		self.lookups.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls issued to the token endpoint.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups that ended without a token.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_lookup(&self) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
