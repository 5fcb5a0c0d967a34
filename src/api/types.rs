//! Request bodies and query strings, validated once into typed commands.

// crates.io
use axum::body::Bytes;
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	api::ApiError,
	auth::{IdentifierError, SessionKey, UserKey},
	design::DesignSpec,
};

/// `POST /canva/export` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
	/// Source URLs; only the first is used.
	#[serde(default)]
	pub files: Vec<String>,
	/// Explicit session key.
	pub session_id: Option<String>,
	/// Optional title.
	pub export_title: Option<String>,
}
impl ExportRequest {
	/// Validates the body into an [`ExportCommand`].
	pub fn validate(self) -> Result<ExportCommand, ApiError> {
		let Some(first) = self.files.first() else {
			return Err(ApiError::bad_request("No files"));
		};
		let source = Url::parse(first.trim()).map_err(|_| ApiError::bad_request("Invalid file URL"))?;

		if !matches!(source.scheme(), "http" | "https") {
			return Err(ApiError::bad_request("Invalid file URL"));
		}

		Ok(ExportCommand {
			session: parse_session(self.session_id.as_deref())?,
			source,
			title: self.export_title,
		})
	}
}

/// Validated artifact deposit by download.
#[derive(Clone, Debug)]
pub struct ExportCommand {
	/// Explicit session key, if supplied.
	pub session: Option<SessionKey>,
	/// URL the artifact is downloaded from.
	pub source: Url,
	/// Optional title.
	pub title: Option<String>,
}

/// `POST /pressero/upload` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
	/// Explicit session key.
	pub session_id: Option<String>,
	/// Optional filename.
	pub filename: Option<String>,
	/// Base64-encoded artifact.
	pub file_base64: Option<String>,
}
impl UploadRequest {
	/// Validates the body into an [`UploadCommand`], decoding the payload.
	pub fn validate(self) -> Result<UploadCommand, ApiError> {
		let encoded = self
			.file_base64
			.as_deref()
			.map(str::trim)
			.filter(|v| !v.is_empty())
			.ok_or_else(|| ApiError::bad_request("Missing sessionId or fileBase64"))?;
		let payload = STANDARD
			.decode(encoded)
			.map_err(|_| ApiError::bad_request("fileBase64 is not valid base64"))?;

		Ok(UploadCommand {
			session: parse_session(self.session_id.as_deref())?,
			filename: self.filename,
			payload: Bytes::from(payload),
		})
	}
}

/// Validated inline deposit.
#[derive(Clone, Debug)]
pub struct UploadCommand {
	/// Explicit session key, if supplied.
	pub session: Option<SessionKey>,
	/// Optional filename.
	pub filename: Option<String>,
	/// Decoded artifact bytes.
	pub payload: Bytes,
}

/// `POST /canva/design` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRequest {
	/// Width in millimeters.
	pub width_mm: Option<f64>,
	/// Height in millimeters.
	pub height_mm: Option<f64>,
	/// User on whose behalf the design is created.
	pub user_key: Option<String>,
	/// Optional design title.
	pub title: Option<String>,
}
impl DesignRequest {
	/// Validates the body into a [`DesignCommand`].
	pub fn validate(self) -> Result<DesignCommand, ApiError> {
		let user = parse_user(self.user_key.as_deref())?;
		let (Some(width_mm), Some(height_mm)) = (self.width_mm, self.height_mm) else {
			return Err(ApiError::bad_request("Missing widthMm or heightMm"));
		};

		if ![width_mm, height_mm].iter().all(|v| v.is_finite() && *v > 0.) {
			return Err(ApiError::bad_request("widthMm and heightMm must be positive numbers"));
		}

		Ok(DesignCommand { user, spec: DesignSpec { width_mm, height_mm, title: self.title } })
	}
}

/// Validated design-creation request.
#[derive(Clone, Debug)]
pub struct DesignCommand {
	/// Requesting user.
	pub user: UserKey,
	/// Size and title of the design.
	pub spec: DesignSpec,
}

/// Body of `POST /pressero/clear` and query of `GET /pressero/ready`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
	/// Explicit session key.
	pub session_id: Option<String>,
}
impl SessionParams {
	/// Parses the optional session key.
	pub fn session(&self) -> Result<Option<SessionKey>, ApiError> {
		parse_session(self.session_id.as_deref())
	}
}

/// Query of `GET /auth/start`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStartParams {
	/// User to authorize.
	pub user_key: Option<String>,
}
impl AuthStartParams {
	/// Parses the user key; blank counts as missing.
	pub fn user(&self) -> Result<UserKey, ApiError> {
		parse_user(self.user_key.as_deref())
	}
}

/// Query of `GET /auth/callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	pub code: Option<String>,
	/// Anti-replay state.
	pub state: Option<String>,
	/// Error code reported by the authorization server.
	pub error: Option<String>,
}

fn parse_session(raw: Option<&str>) -> Result<Option<SessionKey>, ApiError> {
	SessionKey::from_optional(raw).map_err(|e| invalid("sessionId", e))
}

fn parse_user(raw: Option<&str>) -> Result<UserKey, ApiError> {
	UserKey::from_optional(raw)
		.map_err(|e| invalid("userKey", e))?
		.ok_or_else(|| ApiError::bad_request("Missing userKey"))
}

fn invalid(field: &str, e: IdentifierError) -> ApiError {
	ApiError::bad_request(format!("Invalid {field}: {e}"))
}
