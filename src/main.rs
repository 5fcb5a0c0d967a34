//! Relay server entry point.

// crates.io
use color_eyre::eyre::Result;
use tokio::net::TcpListener;
// self
use design_relay::{
	api::{self, AppState, HttpSettings},
	config::RelayConfig,
	handoff::{self, Handoff},
	obs,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = RelayConfig::from_env()?;

	obs::init_tracing(config.log_format);

	let state = AppState::new(Handoff::from_config(&config)?, config.session.clone());
	let sweeper =
		tokio::spawn(handoff::sweep_periodically(state.handoff.clone(), handoff::SWEEP_INTERVAL));
	let app = api::router(state, &HttpSettings::from_config(&config));
	let listener = TcpListener::bind(config.listen).await?;

	tracing::info!(addr = %config.listen, session_mode = ?config.session.mode, "relay listening");

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
	sweeper.abort();

	tracing::info!("relay stopped");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to listen for the shutdown signal");
	}
}
