//! Wiring of the core components for one front end.

use std::sync::Arc;

use anyhow::Result;
use logrelay_core::auth::AuthOptions;
use logrelay_core::{
    storage, AuthController, Config, FirebaseGateway, LogPoller, Notifier, TokenRelay, ViewBinding,
};
use tracing::warn;

pub struct Services {
    pub auth: AuthController,
    pub poller: LogPoller,
}

impl Services {
    pub fn build(
        config: &Config,
        notifier: Arc<dyn Notifier>,
        view: Arc<dyn ViewBinding>,
    ) -> Result<Self> {
        let server = config.server()?;
        let cache_dir = config.cache_dir()?;

        if config.firebase.api_key.is_none() {
            warn!("FIREBASE_API_KEY is not set; sign-in will fail");
        }

        let store = storage::open(config.token_store, &cache_dir)?;
        let gateway = Arc::new(FirebaseGateway::from_config(
            &config.firebase,
            Some(cache_dir),
        )?);
        let relay = Arc::new(TokenRelay::new(&server, Arc::clone(&store), Arc::clone(&view))?);

        let auth = AuthController::new(gateway, notifier, Arc::clone(&view), relay, AuthOptions::from(config));
        let poller = LogPoller::new(&server, config.timing.poll_interval(), Arc::clone(&store), view)?;

        Ok(Self {
            auth,
            poller,
        })
    }
}
