//! Request handlers.

// crates.io
use axum::{
	Json,
	body::Bytes,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::{StatusCode, header},
	response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};
// self
use crate::{
	api::{
		ApiError, AppState, session,
		types::{
			AuthStartParams, CallbackParams, DesignRequest, ExportRequest, SessionParams,
			UploadRequest,
		},
	},
	flows::AuthorizationError,
	handoff::{DesignOutcome, Readiness},
};

const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

pub(super) async fn health() -> Json<Value> {
	Json(json!({ "ok": true }))
}

pub(super) async fn export(
	State(state): State<AppState>,
	jar: CookieJar,
	payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
	let command = json_body(payload)?.validate()?;
	let (jar, session) =
		session::resolve(&state.session, jar, command.session, "Missing sessionId")?;

	tracing::info!(session = %session, source_host = ?command.source.host_str(), "export received");

	let url = state
		.handoff
		.deposit_from_sources(&session, std::slice::from_ref(&command.source), command.title)
		.await
		.map_err(|e| ApiError::from_handoff(e, "Export failed"))?;

	Ok((jar, Json(json!({ "ok": true, "url": url }))))
}

pub(super) async fn upload(
	State(state): State<AppState>,
	jar: CookieJar,
	payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
	let command = json_body(payload)?.validate()?;
	let (jar, session) =
		session::resolve(&state.session, jar, command.session, "Missing sessionId or fileBase64")?;
	let url = state.handoff.deposit_inline(&session, command.payload, command.filename);

	tracing::info!(session = %session, "inline artifact stored");

	Ok((jar, Json(json!({ "ok": true, "url": url }))))
}

pub(super) async fn ready(
	State(state): State<AppState>,
	jar: CookieJar,
	params: Result<Query<SessionParams>, QueryRejection>,
) -> Response {
	// Polling never fails; an unusable id is simply not ready.
	let explicit = params.ok().and_then(|Query(params)| params.session().ok().flatten());
	let body = match session::existing(&state.session, &jar, explicit) {
		Some(session) => match state.handoff.poll(&session) {
			Readiness::Ready { url } => json!({ "ready": true, "url": url }),
			Readiness::Pending => json!({ "ready": false }),
		},
		None => json!({ "ready": false }),
	};

	(NO_STORE, Json(body)).into_response()
}

pub(super) async fn file(State(state): State<AppState>, Path(file): Path<String>) -> Response {
	let Some(session) = file.strip_suffix(".pdf") else {
		return ApiError::NotFound.into_response();
	};

	match state.handoff.retrieve(session) {
		Some(payload) =>
			([(header::CONTENT_TYPE, "application/pdf"), (header::CACHE_CONTROL, "no-store")], payload)
				.into_response(),
		None => ApiError::NotFound.into_response(),
	}
}

pub(super) async fn clear(
	State(state): State<AppState>,
	jar: CookieJar,
	body: Bytes,
) -> Result<Json<Value>, ApiError> {
	let params: SessionParams = if body.iter().all(u8::is_ascii_whitespace) {
		SessionParams::default()
	} else {
		serde_json::from_slice(&body)
			.map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?
	};

	if let Some(session) = session::existing(&state.session, &jar, params.session()?) {
		state.handoff.clear(&session);
	}

	Ok(Json(json!({ "ok": true })))
}

pub(super) async fn auth_start(
	State(state): State<AppState>,
	Query(params): Query<AuthStartParams>,
) -> Result<Redirect, ApiError> {
	let user = params.user()?;
	let broker =
		state.handoff.broker().map_err(|e| ApiError::from_handoff(e, "Authorization failed"))?;
	let redirect = broker.begin_authorization(&user);

	Ok(Redirect::to(redirect.authorize_url.as_str()))
}

pub(super) async fn auth_callback(
	State(state): State<AppState>,
	Query(params): Query<CallbackParams>,
) -> Response {
	let Ok(broker) = state.handoff.broker() else {
		return ApiError::NotConfigured.into_response();
	};

	if let Some(error) = params.error.as_deref() {
		tracing::warn!(error, "authorization server reported an error");

		return callback_page(StatusCode::BAD_REQUEST, "Authorization was not granted.");
	}

	match broker.complete_authorization(params.code.as_deref(), params.state.as_deref()).await {
		Ok(_) => callback_page(StatusCode::OK, "Authorization complete. You can close this window."),
		Err(AuthorizationError::ExchangeFailed(_)) =>
			callback_page(StatusCode::INTERNAL_SERVER_ERROR, "Authorization failed. Please try again."),
		Err(e) => callback_page(StatusCode::BAD_REQUEST, e.reason()),
	}
}

pub(super) async fn design(
	State(state): State<AppState>,
	payload: Result<Json<DesignRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
	let command = json_body(payload)?.validate()?;
	let outcome = state
		.handoff
		.create_design(&command.user, &command.spec)
		.await
		.map_err(|e| ApiError::from_handoff(e, "Design creation failed"))?;
	let body = match outcome {
		DesignOutcome::Created { edit_url } => json!({ "ok": true, "editUrl": edit_url }),
		DesignOutcome::NeedsAuthorization { auth_url } =>
			json!({ "ok": false, "needAuth": true, "authUrl": auth_url.as_str() }),
	};

	Ok(Json(body))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
	payload.map(|Json(body)| body).map_err(|e| ApiError::bad_request(e.body_text()))
}

fn callback_page(status: StatusCode, message: &str) -> Response {
	let page = format!(
		"<!doctype html><html><head><meta charset=\"utf-8\"><title>Authorization</title>\
		 </head><body><p>{message}</p>\
		 <script>setTimeout(function(){{window.close()}},1500)</script></body></html>"
	);

	(status, NO_STORE, Html(page)).into_response()
}
