//! Internal facade over the `oauth2` crate for the two token endpoint grants the relay uses:
//! authorization code (+ PKCE verifier) and refresh token.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{
		BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError,
		BasicTokenResponse,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserKey},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ClientAuthMethod, ProviderDescriptor},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const TOKEN_ENDPOINT: &str = "the token endpoint";

/// Grants issued against the token endpoint, used to label failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenGrant {
	AuthorizationCode,
	RefreshToken,
}
impl TokenGrant {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			TokenGrant::AuthorizationCode => "authorization_code",
			TokenGrant::RefreshToken => "refresh_token",
		}
	}
}

pub(crate) struct OAuthFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
}
impl<C> OAuthFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&str>,
		http_client: Arc<C>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let secret =
			if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::NoneWithPkce) {
				None
			} else {
				client_secret.map(|value| ClientSecret::new(value.to_owned()))
			};
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let Some(secret) = secret {
			oauth_client = oauth_client.set_client_secret(secret);
		}
		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}

	/// Exchanges an authorization code plus PKCE verifier for a fresh token record.
	pub(crate) async fn exchange_authorization_code(
		&self,
		user: UserKey,
		code: &str,
		pkce_verifier: &str,
		redirect_uri: &Url,
	) -> Result<TokenRecord> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error::<C>(TokenGrant::AuthorizationCode, meta.take(), err))?;

		map_token_response(user, response, None)
	}

	/// Redeems a refresh token; the previous refresh secret is carried over when the
	/// provider does not rotate it.
	pub(crate) async fn refresh_token(
		&self,
		user: UserKey,
		refresh_token: &str,
	) -> Result<TokenRecord> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error::<C>(TokenGrant::RefreshToken, meta.take(), err))?;

		map_token_response(user, response, Some(refresh_token))
	}
}

fn map_token_response(
	user: UserKey,
	response: BasicTokenResponse,
	previous_refresh: Option<&str>,
) -> Result<TokenRecord> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let mut builder = TokenRecord::builder(user)
		.access_token(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in));

	match (response.refresh_token(), previous_refresh) {
		(Some(rotated), _) => builder = builder.refresh_token(rotated.secret().to_owned()),
		(None, Some(previous)) => builder = builder.refresh_token(previous),
		(None, None) => {},
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error<C>(
	grant: TokenGrant,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
) -> Error
where
	C: ?Sized + TokenHttpClient,
{
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(grant, response, status),
		RequestTokenError::Request(error) => map_transport_error::<C>(error, status),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source, status }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_server_response_error(
	grant: TokenGrant,
	response: BasicErrorResponse,
	status: Option<u16>,
) -> Error {
	let message = match response.error_description() {
		Some(description) => format!("{} ({description})", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidGrant =>
			Error::InvalidGrant { reason: format!("{} grant rejected: {message}", grant.as_str()) },
		_ => TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_transport_error<C>(err: HttpClientError<C::TransportError>, status: Option<u16>) -> Error
where
	C: ?Sized + TokenHttpClient,
{
	match err {
		HttpClientError::Reqwest(inner) if C::is_timeout(&inner) =>
			TransportError::Timeout { target: TOKEN_ENDPOINT }.into(),
		HttpClientError::Reqwest(inner) => TransportError::network(TOKEN_ENDPOINT, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status,
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		}
		.into(),
	}
}
