//! Design-creation client: converts physical sizes to pixels and asks the design API for a new
//! blank design the user can edit.

// crates.io
use reqwest::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{TransportError, UpstreamError},
};

const DESIGN_API: &str = "design API";
const MM_PER_INCH: f64 = 25.4;

/// Resolution used for mm→px conversion unless configured otherwise.
pub const DEFAULT_DPI: u32 = 96;

/// Converts millimeters to device pixels at `dpi`, rounding half away from zero.
pub fn mm_to_px(mm: f64, dpi: u32) -> u32 {
	(mm / MM_PER_INCH * f64::from(dpi)).round().max(0.) as u32
}

/// Physical size and optional title of a design to create.
#[derive(Clone, Debug, PartialEq)]
pub struct DesignSpec {
	/// Width in millimeters.
	pub width_mm: f64,
	/// Height in millimeters.
	pub height_mm: f64,
	/// Title shown in the design tool.
	pub title: Option<String>,
}

/// Design returned by the design API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedDesign {
	/// Design identifier, when reported.
	pub id: Option<String>,
	/// URL at which the user edits the design.
	pub edit_url: String,
}

#[derive(Debug, Serialize)]
struct CreateDesignBody<'a> {
	design_type: DesignType,
	#[serde(skip_serializing_if = "Option::is_none")]
	title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DesignType {
	#[serde(rename = "type")]
	kind: &'static str,
	width: u32,
	height: u32,
}

#[derive(Debug, Deserialize)]
struct CreateDesignResponse {
	#[serde(default)]
	design: Option<DesignPayload>,
}

#[derive(Debug, Deserialize)]
struct DesignPayload {
	#[serde(default)]
	id: Option<String>,
	#[serde(default)]
	urls: Option<DesignUrls>,
}

#[derive(Debug, Deserialize)]
struct DesignUrls {
	#[serde(default)]
	edit_url: Option<String>,
}

/// Client for the design API's create-design endpoint.
#[derive(Clone, Debug)]
pub struct DesignClient {
	client: ReqwestClient,
	endpoint: String,
	dpi: u32,
}
impl DesignClient {
	/// Creates a client that posts to `{api_base}/v1/designs`.
	pub fn new(client: ReqwestClient, api_base: &Url, dpi: u32) -> Self {
		let endpoint = format!("{}/v1/designs", api_base.as_str().trim_end_matches('/'));

		Self { client, endpoint, dpi }
	}

	/// Creates a custom-sized design on behalf of the token's owner.
	///
	/// A 401 answer maps to [`Error::Revoked`] so callers can invalidate the cached token.
	pub async fn create_design(
		&self,
		access_token: &TokenSecret,
		spec: &DesignSpec,
	) -> Result<CreatedDesign> {
		let body = CreateDesignBody {
			design_type: DesignType {
				kind: "custom",
				width: mm_to_px(spec.width_mm, self.dpi),
				height: mm_to_px(spec.height_mm, self.dpi),
			},
			title: spec.title.as_deref(),
		};

		tracing::debug!(
			width = body.design_type.width,
			height = body.design_type.height,
			"requesting design creation"
		);

		let response = self
			.client
			.post(&self.endpoint)
			.bearer_auth(access_token.expose())
			.json(&body)
			.send()
			.await
			.map_err(|e| TransportError::from_reqwest(DESIGN_API, e))?;
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED {
			return Err(Error::Revoked);
		}
		if !status.is_success() {
			return Err(UpstreamError::Status { service: DESIGN_API, status: status.as_u16() }.into());
		}

		let bytes = response.bytes().await.map_err(|e| TransportError::from_reqwest(DESIGN_API, e))?;

		parse_created_design(&bytes)
	}
}

fn parse_created_design(bytes: &[u8]) -> Result<CreatedDesign> {
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);
	let parsed: CreateDesignResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| UpstreamError::Malformed { service: DESIGN_API, source })?;
	let design = parsed.design.ok_or(UpstreamError::NoEditUrl)?;
	let edit_url = design
		.urls
		.and_then(|urls| urls.edit_url)
		.filter(|url| !url.trim().is_empty())
		.ok_or(UpstreamError::NoEditUrl)?;

	Ok(CreatedDesign { id: design.id, edit_url })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn converts_millimeters_at_configured_dpi() {
		assert_eq!(mm_to_px(210., 96), 794);
		assert_eq!(mm_to_px(297., 96), 1123);
		assert_eq!(mm_to_px(25.4, 300), 300);
		assert_eq!(mm_to_px(0., DEFAULT_DPI), 0);
	}

	#[test]
	fn parses_edit_url() {
		let design = parse_created_design(
			br#"{"design":{"id":"D1","urls":{"edit_url":"https://design.example.com/D1/edit"}}}"#,
		)
		.expect("Response with edit URL should parse.");

		assert_eq!(design.id.as_deref(), Some("D1"));
		assert_eq!(design.edit_url, "https://design.example.com/D1/edit");
	}

	#[test]
	fn missing_edit_url_is_distinct_failure() {
		for body in [
			&br#"{"design":{"id":"D1"}}"#[..],
			br#"{}"#,
			br#"{"design":{"urls":{"edit_url":""}}}"#,
		] {
			let err = parse_created_design(body).expect_err("Missing edit URL must fail.");

			assert!(matches!(err, Error::Upstream(UpstreamError::NoEditUrl)));
		}
	}

	#[test]
	fn malformed_body_reports_path() {
		let err = parse_created_design(br#"{"design":{"urls":{"edit_url":42}}}"#)
			.expect_err("Wrong type must fail.");

		let Error::Upstream(UpstreamError::Malformed { source, .. }) = err else {
			panic!("Expected a malformed-response error.");
		};

		assert_eq!(source.path().to_string(), "design.urls.edit_url");
	}
}
