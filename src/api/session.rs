//! Session addressing: either explicit `sessionId` values or a relay-minted cookie, never both
//! in one deployment.

// crates.io
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
// self
use crate::{
	api::ApiError,
	auth::SessionKey,
	config::{SessionMode, SessionSettings},
};

/// Resolves the session key for a request.
///
/// In explicit mode `explicit` must be present, otherwise the request fails with `missing` as
/// its message. In cookie mode `explicit` is ignored; the cookie's key is reused when valid,
/// otherwise a fresh key is minted. The returned jar always carries a refreshed cookie in
/// cookie mode.
pub fn resolve(
	settings: &SessionSettings,
	jar: CookieJar,
	explicit: Option<SessionKey>,
	missing: &'static str,
) -> Result<(CookieJar, SessionKey), ApiError> {
	match settings.mode {
		SessionMode::Explicit =>
			explicit.map(|session| (jar, session)).ok_or_else(|| ApiError::bad_request(missing)),
		SessionMode::Cookie => {
			let session = from_cookie(settings, &jar).unwrap_or_else(|| {
				let minted = SessionKey::generate();

				tracing::debug!(session = %minted, "session cookie minted");

				minted
			});
			let jar = jar.add(session_cookie(settings, &session));

			Ok((jar, session))
		},
	}
}

/// Like [`resolve`], but never mints a key; used by operations that only read or clear.
pub fn existing(
	settings: &SessionSettings,
	jar: &CookieJar,
	explicit: Option<SessionKey>,
) -> Option<SessionKey> {
	match settings.mode {
		SessionMode::Explicit => explicit,
		SessionMode::Cookie => from_cookie(settings, jar),
	}
}

/// Builds the session cookie: `SameSite=None; Secure; HttpOnly`, scoped to the whole site.
pub fn session_cookie(settings: &SessionSettings, session: &SessionKey) -> Cookie<'static> {
	Cookie::build((settings.cookie_name.clone(), session.to_string()))
		.http_only(true)
		.secure(true)
		.same_site(SameSite::None)
		.path("/")
		.max_age(settings.cookie_ttl)
		.build()
}

fn from_cookie(settings: &SessionSettings, jar: &CookieJar) -> Option<SessionKey> {
	jar.get(&settings.cookie_name).and_then(|cookie| SessionKey::new(cookie.value()).ok())
}
