//! Downloads exported artifacts from the producer's file URLs.

// crates.io
use axum::body::Bytes;
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError, UpstreamError},
};

const ARTIFACT_SOURCE: &str = "artifact source";

/// HTTP fetcher for artifact source URLs.
///
/// The wrapped client carries the upstream timeout; a timed-out download fails like any other
/// transport error and nothing is stored.
#[derive(Clone, Debug)]
pub struct ArtifactSource {
	client: ReqwestClient,
}
impl ArtifactSource {
	/// Redirect hops followed before a download is abandoned.
	pub const MAX_REDIRECTS: usize = 5;

	/// Wraps a configured reqwest client.
	pub fn new(client: ReqwestClient) -> Self {
		Self { client }
	}

	/// Builds a dedicated client with `timeout` that follows up to [`Self::MAX_REDIRECTS`]
	/// redirects, as signed export URLs usually point at a storage redirect.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(Policy::limited(Self::MAX_REDIRECTS))
			.build()?;

		Ok(Self::new(client))
	}

	/// Fetches the full response body of `url`; any non-success status is an error.
	pub async fn download(&self, url: &Url) -> Result<Bytes> {
		let response = self
			.client
			.get(url.clone())
			.send()
			.await
			.map_err(|e| TransportError::from_reqwest(ARTIFACT_SOURCE, e))?;
		let status = response.status();

		if !status.is_success() {
			return Err(
				UpstreamError::Status { service: ARTIFACT_SOURCE, status: status.as_u16() }.into()
			);
		}

		let payload =
			response.bytes().await.map_err(|e| TransportError::from_reqwest(ARTIFACT_SOURCE, e))?;

		tracing::debug!(host = ?url.host_str(), bytes = payload.len(), "artifact downloaded");

		Ok(payload)
	}
}
