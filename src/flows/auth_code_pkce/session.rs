// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{StateToken, TokenSecret, id},
	provider::ProviderDescriptor,
};

const PKCE_VERIFIER_LEN: usize = 64;
const PKCE_VERIFIER_MIN_LEN: usize = 43;
const PKCE_VERIFIER_MAX_LEN: usize = 128;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Redirect issued by [`Broker::begin_authorization`](crate::flows::Broker::begin_authorization).
#[derive(Clone, Debug)]
pub struct AuthorizationRedirect {
	/// Opaque state value that must round-trip via the callback.
	pub state: StateToken,
	/// Fully-formed authorize URL that the end user should be sent to.
	pub authorize_url: Url,
}

#[derive(Clone)]
pub(crate) struct PkcePair {
	pub(crate) verifier: TokenSecret,
	pub(crate) challenge: String,
	pub(crate) method: PkceCodeChallengeMethod,
}
impl PkcePair {
	pub(crate) fn generate() -> Self {
		let verifier = id::random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier: TokenSecret::new(verifier), challenge, method: PkceCodeChallengeMethod::S256 }
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &self.verifier)
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// RFC 7636 §4.1: 43-128 characters from the unreserved set.
pub(crate) fn is_valid_verifier(verifier: &str) -> bool {
	(PKCE_VERIFIER_MIN_LEN..=PKCE_VERIFIER_MAX_LEN).contains(&verifier.len())
		&& verifier.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

pub(crate) fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	state: &StateToken,
	pkce: &PkcePair,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if let Some(scope_value) = descriptor.scope_param() {
		pairs.append_pair("scope", &scope_value);
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	drop(pairs);

	url
}

pub(crate) fn compute_pkce_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}
