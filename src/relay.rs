//! Artifact Relay Store: at most one pending artifact per session key, served at a stable
//! public locator until it is cleared, taken, or outlives the retention window.
//!
//! The store performs no authentication. Anyone holding a session key may read or clear its
//! record, so keys handed out to producers must be unguessable.

pub mod source;

pub use source::ArtifactSource;

// crates.io
use axum::body::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
// self
use crate::{_prelude::*, auth::SessionKey};

/// Characters left unescaped in a session key path segment (RFC 3986 unreserved plus the
/// sub-delimiters `encodeURIComponent` keeps).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

/// Title used when the producer does not supply one.
pub const DEFAULT_TITLE: &str = "Canva → Pressero";
/// Filename used when the producer does not supply one.
pub const DEFAULT_FILENAME: &str = "design.pdf";

/// Optional metadata attached to a deposit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactMetadata {
	/// Human-readable title.
	pub title: Option<String>,
	/// Original filename.
	pub filename: Option<String>,
}

/// One stored artifact.
#[derive(Clone, Debug)]
pub struct ArtifactRecord {
	/// Raw artifact bytes; immutable once stored.
	pub payload: Bytes,
	/// Address at which third parties retrieve the payload.
	pub public_locator: String,
	/// Instant the artifact was stored.
	pub created_at: OffsetDateTime,
	/// Human-readable title.
	pub title: String,
	/// Filename reported by the producer.
	pub filename: String,
}

/// Session-keyed artifact store with passive expiry.
#[derive(Debug)]
pub struct ArtifactStore {
	records: RwLock<HashMap<SessionKey, ArtifactRecord>>,
	public_base: String,
	retention: Duration,
}
impl ArtifactStore {
	/// Retention window applied unless configured otherwise.
	pub const DEFAULT_RETENTION: Duration = Duration::minutes(15);

	/// Creates an empty store whose locators live under `public_base`.
	pub fn new(public_base: &Url, retention: Duration) -> Self {
		Self {
			records: Default::default(),
			public_base: public_base.as_str().trim_end_matches('/').to_owned(),
			retention,
		}
	}

	/// Deterministic public locator for `session`.
	pub fn locator_for(&self, session: &SessionKey) -> String {
		format!("{}/files/{}.pdf", self.public_base, utf8_percent_encode(session, SEGMENT))
	}

	/// Stores or replaces the artifact for `session` and returns its public locator.
	pub fn put(&self, session: &SessionKey, payload: Bytes, metadata: ArtifactMetadata) -> String {
		self.put_at(session, payload, metadata, OffsetDateTime::now_utc())
	}

	/// [`put`](Self::put) with an explicit clock reading.
	pub fn put_at(
		&self,
		session: &SessionKey,
		payload: Bytes,
		metadata: ArtifactMetadata,
		now: OffsetDateTime,
	) -> String {
		let public_locator = self.locator_for(session);
		let record = ArtifactRecord {
			payload,
			public_locator: public_locator.clone(),
			created_at: now,
			title: non_blank_or(metadata.title, DEFAULT_TITLE),
			filename: non_blank_or(metadata.filename, DEFAULT_FILENAME),
		};
		let replaced = self.records.write().insert(session.clone(), record).is_some();

		tracing::debug!(session = %session, replaced, "artifact stored");

		public_locator
	}

	/// Non-destructive read; expired records are removed and reported as absent.
	pub fn peek(&self, session: &str) -> Option<ArtifactRecord> {
		self.peek_at(session, OffsetDateTime::now_utc())
	}

	/// [`peek`](Self::peek) with an explicit clock reading.
	pub fn peek_at(&self, session: &str, now: OffsetDateTime) -> Option<ArtifactRecord> {
		{
			let records = self.records.read();
			let record = records.get(session)?;

			if !self.is_expired(record, now) {
				return Some(record.clone());
			}
		}

		let mut records = self.records.write();

		// Re-check under the write lock; a fresh put may have landed in between.
		if records.get(session).is_some_and(|record| self.is_expired(record, now)) {
			records.remove(session);
			tracing::debug!(session, "artifact expired");
		}

		None
	}

	/// Destructive read; returns the payload and removes the record.
	pub fn take(&self, session: &str) -> Option<Bytes> {
		self.take_at(session, OffsetDateTime::now_utc())
	}

	/// [`take`](Self::take) with an explicit clock reading.
	pub fn take_at(&self, session: &str, now: OffsetDateTime) -> Option<Bytes> {
		let record = self.records.write().remove(session)?;

		if self.is_expired(&record, now) { None } else { Some(record.payload) }
	}

	/// Removes the record for `session`; returns whether one existed.
	pub fn clear(&self, session: &str) -> bool {
		let removed = self.records.write().remove(session).is_some();

		if removed {
			tracing::debug!(session, "artifact cleared");
		}

		removed
	}

	/// Drops every record older than the retention window; returns how many were removed.
	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut records = self.records.write();
		let before = records.len();

		records.retain(|_, record| !self.is_expired(record, now));

		before - records.len()
	}

	/// Number of stored records, expired ones included.
	pub fn len(&self) -> usize {
		self.records.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.records.read().is_empty()
	}

	fn is_expired(&self, record: &ArtifactRecord, now: OffsetDateTime) -> bool {
		now - record.created_at > self.retention
	}
}

fn non_blank_or(value: Option<String>, default: &str) -> String {
	value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const PDF_MAGIC: &[u8] = &[0x25, 0x50, 0x44, 0x46];

	fn store() -> ArtifactStore {
		ArtifactStore::new(
			&Url::parse("https://relay.example.com/").expect("Base URL fixture should parse."),
			ArtifactStore::DEFAULT_RETENTION,
		)
	}

	fn session(value: &str) -> SessionKey {
		SessionKey::new(value).expect("Session fixture should be valid.")
	}

	#[test]
	fn put_then_peek_returns_payload_and_locator() {
		let store = store();
		let locator = store.put(&session("abc"), Bytes::from_static(PDF_MAGIC), Default::default());
		let record = store.peek("abc").expect("Stored artifact should be visible.");

		assert_eq!(locator, "https://relay.example.com/files/abc.pdf");
		assert_eq!(record.payload.as_ref(), PDF_MAGIC);
		assert_eq!(record.public_locator, locator);
		assert_eq!(record.title, DEFAULT_TITLE);
		assert_eq!(record.filename, DEFAULT_FILENAME);
	}

	#[test]
	fn locator_percent_encodes_session_key() {
		assert_eq!(
			store().locator_for(&session("a/b?c#d")),
			"https://relay.example.com/files/a%2Fb%3Fc%23d.pdf"
		);
	}

	#[test]
	fn second_put_replaces_first() {
		let store = store();

		store.put(&session("s"), Bytes::from_static(b"one"), Default::default());
		store.put(
			&session("s"),
			Bytes::from_static(b"two"),
			ArtifactMetadata { title: Some("Flyer".into()), filename: None },
		);

		let record = store.peek("s").expect("Replacement should be visible.");

		assert_eq!(record.payload.as_ref(), b"two");
		assert_eq!(record.title, "Flyer");
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn take_is_single_read() {
		let store = store();

		store.put(&session("s"), Bytes::from_static(PDF_MAGIC), Default::default());

		assert_eq!(store.take("s").as_deref(), Some(PDF_MAGIC));
		assert!(store.take("s").is_none());
		assert!(store.peek("s").is_none());
	}

	#[test]
	fn clear_is_idempotent() {
		let store = store();

		store.put(&session("s"), Bytes::from_static(PDF_MAGIC), Default::default());

		assert!(store.clear("s"));
		assert!(!store.clear("s"));
		assert!(!store.clear("never-stored"));
	}

	#[test]
	fn expired_records_vanish_on_peek_and_purge() {
		let store = store();
		let now = macros::datetime!(2025-01-01 12:00 UTC);

		store.put_at(&session("old"), Bytes::from_static(b"1"), Default::default(), now);
		store.put_at(
			&session("new"),
			Bytes::from_static(b"2"),
			Default::default(),
			now + Duration::minutes(10),
		);

		assert!(store.peek_at("old", now + Duration::minutes(14)).is_some());
		assert!(store.peek_at("old", now + Duration::minutes(16)).is_none());
		assert_eq!(store.len(), 1, "Expired record should be removed by peek.");
		assert!(store.take_at("new", now + Duration::minutes(26)).is_none());
		assert!(store.is_empty());

		store.put_at(&session("a"), Bytes::from_static(b"1"), Default::default(), now);

		assert_eq!(store.purge_expired(now + Duration::hours(1)), 1);
	}
}
