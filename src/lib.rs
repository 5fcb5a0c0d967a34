//! Session-scoped PDF handoff relay: a design tool deposits an exported artifact under an
//! opaque session key, a print storefront polls for it, and an OAuth 2.0 Authorization Code +
//! PKCE token manager keeps the design tool's per-user access tokens valid.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod design;
pub mod error;
pub mod flows;
pub mod handoff;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod relay;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		flows::Broker,
		http::ReqwestHttpClient,
		provider::{ClientAuthMethod, ProviderDescriptor},
		store::{MemoryTokenStore, TokenStore},
	};

	/// Request timeout used by test clients unless a test asks for a shorter one.
	pub const TEST_TIMEOUT: StdDuration = StdDuration::from_secs(5);

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		test_reqwest_client_with_timeout(TEST_TIMEOUT)
	}

	/// Same as [`test_reqwest_client`] with a caller-chosen request timeout.
	pub fn test_reqwest_client_with_timeout(timeout: StdDuration) -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Builds a provider descriptor whose endpoints live under `base`.
	pub fn test_descriptor(base: &str) -> ProviderDescriptor {
		let base = base.trim_end_matches('/');

		ProviderDescriptor::builder()
			.authorization_endpoint(
				Url::parse(&format!("{base}/oauth/authorize"))
					.expect("Mock authorization endpoint should parse successfully."),
			)
			.token_endpoint(
				Url::parse(&format!("{base}/oauth/token"))
					.expect("Mock token endpoint should parse successfully."),
			)
			.scopes(["design:content:write", "design:meta:read"])
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
			.build()
			.expect("Provider descriptor should build successfully.")
	}

	/// Constructs a [`Broker`] backed by an in-memory token store and the insecure reqwest
	/// transport used across integration tests.
	pub fn build_test_broker(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> (Broker<ReqwestHttpClient>, Arc<MemoryTokenStore>) {
		build_test_broker_with_timeout(descriptor, client_id, client_secret, TEST_TIMEOUT)
	}

	/// Like [`build_test_broker`], but token endpoint calls give up after `timeout`.
	pub fn build_test_broker_with_timeout(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		timeout: StdDuration,
	) -> (Broker<ReqwestHttpClient>, Arc<MemoryTokenStore>) {
		let store_backend = Arc::new(MemoryTokenStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let redirect_uri = Url::parse("https://relay.example.com/auth/callback")
			.expect("Redirect URI fixture should parse successfully.");
		let broker = Broker::with_http_client(
			store,
			descriptor,
			client_id,
			redirect_uri,
			ReqwestHttpClient::with_client(test_reqwest_client_with_timeout(timeout)),
		)
		.with_client_secret(client_secret);

		(broker, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
// Binary-only dependency.
use color_eyre as _;
#[cfg(test)] use {http_body_util as _, httpmock as _, tower as _};
