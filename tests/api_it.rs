#![cfg(feature = "test")]

// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;
// self
use design_relay::{
	_preludet::*,
	api::{self, AppState, HttpSettings},
	auth::{TokenRecord, UserKey},
	config::{SessionMode, SessionSettings},
	design::DesignClient,
	handoff::Handoff,
	relay::{ArtifactSource, ArtifactStore},
	store::{MemoryTokenStore, TokenStore},
};

const PDF_MAGIC: [u8; 4] = [0x25, 0x50, 0x44, 0x46];

struct Harness {
	app: Router,
	tokens: Arc<MemoryTokenStore>,
}

fn harness(server: &MockServer, mode: SessionMode, with_oauth: bool) -> Harness {
	harness_with_source(server, mode, with_oauth, ArtifactSource::new(test_reqwest_client()))
}

fn harness_with_source(
	server: &MockServer,
	mode: SessionMode,
	with_oauth: bool,
	source: ArtifactSource,
) -> Harness {
	let artifacts = Arc::new(ArtifactStore::new(
		&Url::parse("https://relay.example.com").expect("Base URL fixture should parse."),
		ArtifactStore::DEFAULT_RETENTION,
	));
	let mut handoff = Handoff::new(artifacts, source);
	let (broker, tokens) =
		build_test_broker(test_descriptor(&server.base_url()), "client-api", "secret-api");

	if with_oauth {
		let api_base = Url::parse(&server.url("/rest")).expect("Design API base should parse.");

		handoff = handoff
			.with_authorizer(Arc::new(broker), DesignClient::new(test_reqwest_client(), &api_base, 96));
	}

	let session = SessionSettings { mode, ..Default::default() };
	let app = api::router(AppState::new(handoff, session), &HttpSettings::default());

	Harness { app, tokens }
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
	app.clone().oneshot(request).await.expect("Router should answer every request.")
}

fn get(uri: &str) -> Request<Body> {
	Request::get(uri).body(Body::empty()).expect("GET request should build.")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
	Request::post(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(body.to_string()))
		.expect("POST request should build.")
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
	response.into_body().collect().await.expect("Body should be readable.").to_bytes().to_vec()
}

async fn body_json(response: Response<Body>) -> Value {
	serde_json::from_slice(&body_bytes(response).await).expect("Body should be JSON.")
}

async fn seed_token(tokens: &MemoryTokenStore, user: &str) {
	let record = TokenRecord::builder(UserKey::new(user).expect("User key fixture should be valid."))
		.access_token("access-live")
		.refresh_token("refresh-live")
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::hours(1))
		.build()
		.expect("Token record fixture should build.");

	tokens.save(record).await.expect("Token seed should succeed.");
}

#[tokio::test]
async fn health_reports_ok() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let response = send(&app, get("/health")).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_json(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn export_poll_retrieve_clear_round() {
	let server = MockServer::start_async().await;
	let source = server
		.mock_async(|when, then| {
			when.method(GET).path("/exports/design.pdf");
			then.status(200).header("content-type", "application/pdf").body(PDF_MAGIC);
		})
		.await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let response = send(
		&app,
		post_json(
			"/canva/export",
			json!({ "files": [server.url("/exports/design.pdf")], "sessionId": "abc" }),
		),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		body_json(response).await,
		json!({ "ok": true, "url": "https://relay.example.com/files/abc.pdf" })
	);

	source.assert_async().await;

	let response = send(&app, get("/pressero/ready?sessionId=abc")).await;

	assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
	assert_eq!(
		body_json(response).await,
		json!({ "ready": true, "url": "https://relay.example.com/files/abc.pdf" })
	);

	let response = send(&app, get("/files/abc.pdf")).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
	assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
	assert_eq!(body_bytes(response).await, PDF_MAGIC);

	let response = send(&app, post_json("/pressero/clear", json!({ "sessionId": "abc" }))).await;

	assert_eq!(body_json(response).await, json!({ "ok": true }));

	let response = send(&app, get("/pressero/ready?sessionId=abc")).await;

	assert_eq!(body_json(response).await, json!({ "ready": false }));
	assert_eq!(send(&app, get("/files/abc.pdf")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_input_errors_are_structured() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let response = send(&app, post_json("/canva/export", json!({ "sessionId": "abc" }))).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(body_json(response).await, json!({ "ok": false, "message": "No files" }));

	let response =
		send(&app, post_json("/canva/export", json!({ "files": ["https://cdn.example.com/a.pdf"] })))
			.await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(body_json(response).await, json!({ "ok": false, "message": "Missing sessionId" }));
}

#[tokio::test]
async fn failed_download_stores_nothing() {
	let server = MockServer::start_async().await;
	let _source = server
		.mock_async(|when, then| {
			when.method(GET).path("/exports/missing.pdf");
			then.status(404);
		})
		.await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let response = send(
		&app,
		post_json(
			"/canva/export",
			json!({ "files": [server.url("/exports/missing.pdf")], "sessionId": "abc" }),
		),
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
	assert_eq!(body_json(response).await, json!({ "ok": false, "message": "Export failed" }));

	let response = send(&app, get("/pressero/ready?sessionId=abc")).await;

	assert_eq!(body_json(response).await, json!({ "ready": false }));
}

#[tokio::test]
async fn inline_upload_is_served() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let response = send(
		&app,
		post_json("/pressero/upload", json!({ "sessionId": "up-1", "fileBase64": "JVBERg==" })),
	)
	.await;

	assert_eq!(
		body_json(response).await,
		json!({ "ok": true, "url": "https://relay.example.com/files/up-1.pdf" })
	);
	assert_eq!(body_bytes(send(&app, get("/files/up-1.pdf")).await).await, PDF_MAGIC);
}

#[tokio::test]
async fn export_follows_source_redirects() {
	let server = MockServer::start_async().await;
	let location = server.url("/storage/design.pdf");
	let _target = server
		.mock_async(|when, then| {
			when.method(GET).path("/storage/design.pdf");
			then.status(200).header("content-type", "application/pdf").body(PDF_MAGIC);
		})
		.await;
	let _signed = server
		.mock_async(|when, then| {
			when.method(GET).path("/exports/signed");
			then.status(302).header("location", location.as_str());
		})
		.await;
	let source = ArtifactSource::with_timeout(TEST_TIMEOUT).expect("Source client should build.");
	let Harness { app, .. } = harness_with_source(&server, SessionMode::Explicit, false, source);
	let response = send(
		&app,
		post_json(
			"/canva/export",
			json!({ "files": [server.url("/exports/signed")], "sessionId": "redir" }),
		),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_bytes(send(&app, get("/files/redir.pdf")).await).await, PDF_MAGIC);
}

#[tokio::test]
async fn slow_source_fails_export_and_stores_nothing() {
	let server = MockServer::start_async().await;
	let _source = server
		.mock_async(|when, then| {
			when.method(GET).path("/exports/slow.pdf");
			then.status(200).delay(StdDuration::from_secs(2)).body(PDF_MAGIC);
		})
		.await;
	let source = ArtifactSource::with_timeout(StdDuration::from_millis(200))
		.expect("Source client should build.");
	let Harness { app, .. } = harness_with_source(&server, SessionMode::Explicit, false, source);
	let response = send(
		&app,
		post_json(
			"/canva/export",
			json!({ "files": [server.url("/exports/slow.pdf")], "sessionId": "slow" }),
		),
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
	assert_eq!(body_json(response).await, json!({ "ok": false, "message": "Export failed" }));

	let response = send(&app, get("/pressero/ready?sessionId=slow")).await;

	assert_eq!(body_json(response).await, json!({ "ready": false }));
}

#[tokio::test]
async fn ready_treats_unusable_session_ids_as_pending() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let too_long = format!("/pressero/ready?sessionId={}", "a".repeat(200));

	for uri in [
		"/pressero/ready?sessionId=a%20b",
		too_long.as_str(),
		"/pressero/ready?sessionId=a&sessionId=b",
		"/pressero/ready",
	] {
		let response = send(&app, get(uri)).await;

		assert_eq!(response.status(), StatusCode::OK, "Polling `{uri}` must answer 200.");
		assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
		assert_eq!(body_json(response).await, json!({ "ready": false }));
	}
}

#[tokio::test]
async fn upload_without_session_names_both_fields() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);

	for body in [json!({ "fileBase64": "JVBERg==" }), json!({ "sessionId": "up-2" })] {
		let response = send(&app, post_json("/pressero/upload", body)).await;

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(
			body_json(response).await,
			json!({ "ok": false, "message": "Missing sessionId or fileBase64" })
		);
	}
}

#[tokio::test]
async fn cookie_mode_addresses_sessions_by_cookie() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Cookie, false);
	let response =
		send(&app, post_json("/pressero/upload", json!({ "fileBase64": "JVBERg==" }))).await;
	let set_cookie = response
		.headers()
		.get(header::SET_COOKIE)
		.expect("Cookie mode should mint a session cookie.")
		.to_str()
		.expect("Set-Cookie should be ASCII.")
		.to_owned();

	assert!(set_cookie.contains("SameSite=None"));
	assert!(set_cookie.contains("Secure"));

	let body = body_json(response).await;
	let cookie_pair =
		set_cookie.split(';').next().expect("Set-Cookie should carry a pair.").to_owned();
	let session = cookie_pair.split_once('=').expect("Cookie pair should contain `=`.").1.to_owned();

	assert_eq!(body["url"], format!("https://relay.example.com/files/{session}.pdf"));

	let poll = Request::get("/pressero/ready")
		.header(header::COOKIE, &cookie_pair)
		.body(Body::empty())
		.expect("Poll request should build.");

	assert_eq!(body_json(send(&app, poll).await).await["ready"], true);

	let clear = Request::post("/pressero/clear")
		.header(header::COOKIE, &cookie_pair)
		.body(Body::empty())
		.expect("Clear request should build.");

	assert_eq!(body_json(send(&app, clear).await).await, json!({ "ok": true }));

	let response = send(&app, get(&format!("/files/{session}.pdf"))).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn design_without_token_asks_for_authorization() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, true);
	let response = send(
		&app,
		post_json("/canva/design", json!({ "widthMm": 210, "heightMm": 297, "userKey": "u1" })),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);

	let body = body_json(response).await;

	assert_eq!(body["ok"], false);
	assert_eq!(body["needAuth"], true);
	assert!(
		body["authUrl"]
			.as_str()
			.expect("authUrl should be a string.")
			.starts_with(&server.url("/oauth/authorize")),
	);
}

#[tokio::test]
async fn design_with_token_returns_edit_url() {
	let server = MockServer::start_async().await;
	let design_api = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/rest/v1/designs")
				.header("authorization", "Bearer access-live")
				.body_includes("\"width\":794")
				.body_includes("\"height\":1123");
			then.status(200).header("content-type", "application/json").body(
				"{\"design\":{\"id\":\"D1\",\"urls\":{\"edit_url\":\"https://design.example.com/D1/edit\"}}}",
			);
		})
		.await;
	let Harness { app, tokens } = harness(&server, SessionMode::Explicit, true);

	seed_token(&tokens, "u1").await;

	let response = send(
		&app,
		post_json("/canva/design", json!({ "widthMm": 210, "heightMm": 297, "userKey": "u1" })),
	)
	.await;

	assert_eq!(
		body_json(response).await,
		json!({ "ok": true, "editUrl": "https://design.example.com/D1/edit" })
	);

	design_api.assert_async().await;
}

#[tokio::test]
async fn revoked_token_is_invalidated() {
	let server = MockServer::start_async().await;
	let _design_api = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/v1/designs");
			then.status(401);
		})
		.await;
	let Harness { app, tokens } = harness(&server, SessionMode::Explicit, true);

	seed_token(&tokens, "u1").await;

	let response = send(
		&app,
		post_json("/canva/design", json!({ "widthMm": 100, "heightMm": 100, "userKey": "u1" })),
	)
	.await;

	assert_eq!(body_json(response).await["needAuth"], true);
	assert!(tokens.is_empty(), "A revoked token must be dropped.");
}

#[tokio::test]
async fn design_without_edit_url_is_an_upstream_failure() {
	let server = MockServer::start_async().await;
	let _design_api = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/v1/designs");
			then.status(200).header("content-type", "application/json").body("{\"design\":{\"id\":\"D1\"}}");
		})
		.await;
	let Harness { app, tokens } = harness(&server, SessionMode::Explicit, true);

	seed_token(&tokens, "u1").await;

	let response = send(
		&app,
		post_json("/canva/design", json!({ "widthMm": 100, "heightMm": 100, "userKey": "u1" })),
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
	assert_eq!(
		body_json(response).await,
		json!({ "ok": false, "message": "Design creation failed" })
	);
	assert_eq!(tokens.len(), 1, "A missing edit URL is not an authorization failure.");
}

#[tokio::test]
async fn authorization_round_trip() {
	let server = MockServer::start_async().await;
	let token_endpoint = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("code=code-1");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-cb\",\"refresh_token\":\"refresh-cb\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let Harness { app, tokens } = harness(&server, SessionMode::Explicit, true);

	assert_eq!(send(&app, get("/auth/start")).await.status(), StatusCode::BAD_REQUEST);

	let response = send(&app, get("/auth/start?userKey=u1")).await;

	assert!(response.status().is_redirection());

	let location = Url::parse(
		response.headers()[header::LOCATION].to_str().expect("Location should be ASCII."),
	)
	.expect("Location should be an absolute URL.");
	let state = location
		.query_pairs()
		.find(|(k, _)| k == "state")
		.map(|(_, v)| v.into_owned())
		.expect("Authorize URL should carry a state.");
	let callback = format!("/auth/callback?code=code-1&state={state}");
	let response = send(&app, get(&callback)).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(String::from_utf8_lossy(&body_bytes(response).await).contains("Authorization complete"));
	assert_eq!(tokens.len(), 1);

	token_endpoint.assert_async().await;

	assert_eq!(send(&app, get(&callback)).await.status(), StatusCode::BAD_REQUEST);
	assert_eq!(send(&app, get("/auth/callback?state=x")).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn authorization_without_oauth_is_not_configured() {
	let server = MockServer::start_async().await;
	let Harness { app, .. } = harness(&server, SessionMode::Explicit, false);
	let response = send(&app, get("/auth/start?userKey=u1")).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(
		body_json(response).await,
		json!({ "ok": false, "message": "Authorization is not configured" })
	);
}
