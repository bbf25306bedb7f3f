pub mod error;

pub use error::ApiError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ENV: &str = "development";

/// Loads `.env.<NODE_ENV>.local` and then `.env`, returning the environment
/// name. Variables already present in the process environment win.
pub fn load_env() -> String {
    let env = env_name(|key| std::env::var(key).ok());
    let _ = dotenvy::from_filename(format!(".env.{env}.local"));
    let _ = dotenvy::dotenv();
    env
}

/// `NODE_ENV`, then its alias `APP_ENV`, then `development`. Blank values
/// count as unset.
pub fn env_name(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["NODE_ENV", "APP_ENV"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ENV.into())
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Resolves once the process receives Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
