use crate::config::Config;
use crate::requests::OutstandingRequests;
use crate::session::SessionManager;
use crate::strategy::{Credentials, SamlStrategy};
use anyhow::Result;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub strategy: Arc<SamlStrategy>,
    pub sessions: SessionManager,
    pub requests: OutstandingRequests,
}

impl AppState {
    /// Reads the key and certificates named in `config` from disk.
    pub fn new(config: Config) -> Result<Self> {
        let credentials = Credentials::load(&config)?;
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(config: Config, credentials: Credentials) -> Result<Self> {
        let strategy = SamlStrategy::new(&config, credentials)?;
        let sessions = SessionManager::new(
            config.session_secret.as_bytes(),
            config.session_ttl,
            config.secure_cookies(),
        );
        let requests = OutstandingRequests::new(config.request_ttl);

        Ok(Self {
            config,
            strategy: Arc::new(strategy),
            sessions,
            requests,
        })
    }
}
