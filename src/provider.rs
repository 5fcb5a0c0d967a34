//! Authorization server descriptor: validated endpoints, requested scopes, and the client
//! authentication method used at the token endpoint.

// std
use std::net::IpAddr;
// self
use crate::_prelude::*;

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public clients that prove possession via PKCE only.
	NoneWithPkce,
}

/// Endpoint set exposed by the authorization server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint users are redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
}

/// Immutable authorization server descriptor consumed by the token flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint definitions.
	pub endpoints: ProviderEndpoints,
	/// Scopes requested during authorization, in request order.
	pub scopes: Vec<String>,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::default()
	}

	/// Space-delimited `scope` parameter, or `None` when no scope is configured.
	pub fn scope_param(&self) -> Option<String> {
		if self.scopes.is_empty() { None } else { Some(self.scopes.join(" ")) }
	}

	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;

		Ok(())
	}
}

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug, Default)]
pub struct ProviderDescriptorBuilder {
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	scopes: Vec<String>,
	preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Replaces the requested scopes; blank entries and duplicates are dropped.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.scopes.clear();

		for scope in scopes {
			let scope = scope.as_ref().trim();

			if !scope.is_empty() && !self.scopes.iter().any(|s| s == scope) {
				self.scopes.push(scope.to_owned());
			}
		}

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let descriptor = ProviderDescriptor {
			endpoints: ProviderEndpoints { authorization, token },
			scopes: self.scopes,
			preferred_client_auth_method: self.preferred_client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse descriptor test URL.")
	}

	#[test]
	fn descriptor_rejects_insecure_remote_endpoints() {
		let err = ProviderDescriptor::builder()
			.authorization_endpoint(url("http://example.com/auth"))
			.token_endpoint(url("https://example.com/token"))
			.build()
			.expect_err("Plain HTTP on a public host should be rejected.");

		assert!(matches!(
			err,
			ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
		));
	}

	#[test]
	fn descriptor_allows_loopback_http() {
		let descriptor = ProviderDescriptor::builder()
			.authorization_endpoint(url("http://127.0.0.1:8080/auth"))
			.token_endpoint(url("http://localhost:8080/token"))
			.build()
			.expect("Loopback endpoints should be accepted for local development.");

		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(descriptor.scope_param(), None);
	}

	#[test]
	fn descriptor_requires_both_endpoints() {
		let err = ProviderDescriptor::builder()
			.authorization_endpoint(url("https://example.com/auth"))
			.build()
			.expect_err("Token endpoint is mandatory.");

		assert_eq!(err, ProviderDescriptorError::MissingTokenEndpoint);
	}

	#[test]
	fn scopes_are_deduplicated_in_request_order() {
		let descriptor = ProviderDescriptor::builder()
			.authorization_endpoint(url("https://example.com/auth"))
			.token_endpoint(url("https://example.com/token"))
			.scopes(["design:content:write", " ", "design:meta:read", "design:content:write"])
			.build()
			.expect("Descriptor builder should succeed.");

		assert_eq!(descriptor.scope_param().as_deref(), Some("design:content:write design:meta:read"));
	}
}
