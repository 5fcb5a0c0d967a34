//! HTTP error shape: `{ok:false, message}` with a status matching the failure class.

// crates.io
use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, handoff::HandoffError};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
	ok: bool,
	message: &'a str,
}

/// Failures reported by HTTP handlers.
///
/// Upstream failures carry their cause for logging only; the caller sees a generic message.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// Caller input was missing or malformed.
	#[error("{0}")]
	BadRequest(String),
	/// The addressed artifact does not exist or has expired.
	#[error("Not found")]
	NotFound,
	/// The OAuth subsystem is disabled in this deployment.
	#[error("Authorization is not configured")]
	NotConfigured,
	/// A third-party call failed.
	#[error("{message}")]
	Upstream {
		/// Generic message returned to the caller.
		message: &'static str,
		/// Diagnostic cause; logged, never returned.
		#[source]
		source: Error,
	},
}
impl ApiError {
	/// Builds a [`ApiError::BadRequest`].
	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::BadRequest(message.into())
	}

	/// Maps a handoff failure, using `message` for upstream errors.
	pub fn from_handoff(e: HandoffError, message: &'static str) -> Self {
		match e {
			HandoffError::MissingUserKey => Self::bad_request("Missing userKey"),
			HandoffError::NotConfigured => Self::NotConfigured,
			HandoffError::NoFiles => Self::bad_request("No files"),
			HandoffError::Upstream(source) => Self::Upstream { message, source },
		}
	}

	fn status(&self) -> StatusCode {
		match self {
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound => StatusCode::NOT_FOUND,
			ApiError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();

		match &self {
			ApiError::NotFound => return (status, "Not found").into_response(),
			ApiError::Upstream { message, source } =>
				tracing::error!(error = %source, "{message}"),
			ApiError::NotConfigured => tracing::warn!("request needs OAuth but it is not configured"),
			ApiError::BadRequest(_) => {},
		}

		let message = self.to_string();

		(status, Json(ErrorBody { ok: false, message: &message })).into_response()
	}
}
