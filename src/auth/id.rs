//! Strongly typed keys used to address tokens, artifacts, and pending authorizations.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new key after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}

			/// Parses an optional, possibly blank, boundary value.
			///
			/// Blank strings are treated the same as absent ones so callers can map both to a
			/// single "missing" error.
			pub fn from_optional(value: Option<&str>) -> Result<Option<Self>, IdentifierError> {
				match value.map(str::trim) {
					None | Some("") => Ok(None),
					Some(view) => Self::new(view).map(Some),
				}
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when key validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The key was empty.
	#[error("{kind} key cannot be empty.")]
	Empty {
		/// Kind of key (user, session, state).
		kind: &'static str,
	},
	/// The key contains whitespace characters.
	#[error("{kind} key contains whitespace.")]
	ContainsWhitespace {
		/// Kind of key (user, session, state).
		kind: &'static str,
	},
	/// The key exceeded the allowed character count.
	#[error("{kind} key exceeds {max} characters.")]
	TooLong {
		/// Kind of key (user, session, state).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { UserKey, "Opaque key identifying one end user for token caching.", "User" }
def_id! { SessionKey, "Opaque key identifying one artifact handoff.", "Session" }
def_id! { StateToken, "Anti-replay `state` value of an authorization redirect.", "State" }

const GENERATED_LEN: usize = 32;

impl SessionKey {
	/// Mints a fresh random session key for cookie-addressed deployments.
	pub fn generate() -> Self {
		Self(random_string(GENERATED_LEN))
	}
}
impl StateToken {
	/// Mints a fresh random anti-replay state value.
	pub fn generate() -> Self {
		Self(random_string(GENERATED_LEN))
	}
}

pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn keys_reject_whitespace_and_empty_values() {
		assert!(UserKey::new(" user-123").is_err(), "Leading whitespace must be rejected.");
		assert!(SessionKey::new("abc def").is_err(), "Inner whitespace must be rejected.");
		assert!(StateToken::new("").is_err());

		let session = SessionKey::new("abc").expect("Session fixture should be considered valid.");

		assert_eq!(session.as_ref(), "abc");
	}

	#[test]
	fn from_optional_treats_blank_as_missing() {
		assert_eq!(UserKey::from_optional(None), Ok(None));
		assert_eq!(UserKey::from_optional(Some("   ")), Ok(None));
		assert_eq!(
			UserKey::from_optional(Some(" u1 ")).expect("Trimmed key should be valid."),
			Some(UserKey::new("u1").expect("User fixture should be valid."))
		);
		assert!(UserKey::from_optional(Some(&"a".repeat(IDENTIFIER_MAX_LEN + 1))).is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let session: SessionKey =
			serde_json::from_str("\"session-42\"").expect("Session should deserialize.");

		assert_eq!(session.as_ref(), "session-42");
		assert!(serde_json::from_str::<SessionKey>("\"with space\"").is_err());
	}

	#[test]
	fn generated_keys_are_valid_and_distinct() {
		let first = StateToken::generate();
		let second = StateToken::generate();

		assert_eq!(first.len(), GENERATED_LEN);
		assert_ne!(first, second);
		assert!(SessionKey::new(SessionKey::generate().as_ref()).is_ok());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<SessionKey, u8> = HashMap::from_iter([(
			SessionKey::new("abc").expect("Session used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("abc"), Some(&7));
	}
}
