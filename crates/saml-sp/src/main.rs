use saml_sp::config::Config;
use saml_sp::state::AppState;
use saml_sp::{requests, session};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = portal_common::load_env();
    portal_common::init_tracing();

    let config = Config::from_env(env)?;
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config)?);

    tokio::spawn(session::session_cleanup_task(state.sessions.clone()));
    tokio::spawn(requests::request_cleanup_task(state.requests.clone()));

    tracing::info!(
        env = state.config.environment,
        issuer = state.config.issuer,
        entry_point = state.config.entry_point,
        "SAML service provider configured"
    );

    let app = saml_sp::app(state);

    tracing::info!("listening on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(portal_common::shutdown_signal())
        .await?;

    Ok(())
}
