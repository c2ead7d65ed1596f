use std::sync::Arc;

use crate::config_loader::Config;
use crate::models::challenge::NonceValidator;
use crate::models::clock::{Clock, SystemClock};
use crate::models::credentials::{CredentialStore, CredentialStoreError};
use crate::models::sessions::SessionManager;

fn init_credential_store(config: &Config) -> Result<CredentialStore, CredentialStoreError> {
    let path = config.auth.password_file.clone();
    if config.auth.autocreate_password_file {
        CredentialStore::open_or_create(path)
    } else {
        CredentialStore::open(path)
    }
}

pub struct AppContext {
    pub config: Config,
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionManager>,
    pub validator: NonceValidator,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self, CredentialStoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, CredentialStoreError> {
        let credentials = Arc::new(init_credential_store(&config)?);
        Ok(Self::from_parts(config, credentials, clock))
    }

    pub fn from_parts(config: Config, credentials: Arc<CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        let sessions = Arc::new(SessionManager::new(
            clock.clone(),
            config.auth.idle_timeout_seconds,
            config.auth.hard_expiry_seconds,
        ));
        let validator = NonceValidator::new(
            credentials.clone(),
            clock,
            config.auth.max_clock_skew_seconds,
        );
        Self {
            config,
            credentials,
            sessions,
            validator,
        }
    }
}
