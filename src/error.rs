//! Relay-level error types shared across flows, stores, and upstream clients.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint answered with something other than a usable token.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Artifact source or design API failure.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or relay-supplied reason string.
		reason: String,
	},
	/// Access token has been revoked and must not be reused.
	#[error("Token has been revoked.")]
	Revoked,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Environment setting could not be parsed.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Environment variable name.
		name: &'static str,
		/// Human-readable parsing failure.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Builds an [`ConfigError::InvalidSetting`] from any displayable reason.
	pub fn invalid_setting(name: &'static str, reason: impl Display) -> Self {
		Self::InvalidSetting { name, reason: reason.to_string() }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint responses that could not be turned into a token record.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or relay-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Label of the remote that was being called.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Remote did not answer within the configured timeout.
	#[error("Request to {target} timed out.")]
	Timeout {
		/// Label of the remote that was being called.
		target: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target, source: Box::new(src) }
	}

	/// Classifies a reqwest failure, keeping timeouts distinguishable in logs.
	pub fn from_reqwest(target: &'static str, e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { target } } else { Self::network(target, e) }
	}
}

/// Failures reported by third-party services other than the token endpoint.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Service answered with a non-success status.
	#[error("{service} returned HTTP {status}.")]
	Status {
		/// Service label.
		service: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// Service answered with a body that could not be parsed.
	#[error("{service} returned a malformed response.")]
	Malformed {
		/// Service label.
		service: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Design API response did not include an edit URL.
	#[error("Design API response is missing the edit URL.")]
	NoEditUrl,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn upstream_error_converts_into_relay_error() {
		let err: Error = UpstreamError::Status { service: "artifact source", status: 502 }.into();

		assert!(matches!(err, Error::Upstream(UpstreamError::Status { status: 502, .. })));
		assert_eq!(err.to_string(), "artifact source returned HTTP 502.");
	}

	#[test]
	fn invalid_setting_formats_reason() {
		let err = ConfigError::invalid_setting("PORT", "not a number");

		assert_eq!(err.to_string(), "Setting `PORT` is invalid: not a number.");
	}
}
