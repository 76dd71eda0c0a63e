//! sqrl-ssp: the standalone SQRL service provider server.
//!
//! Binds the protocol engine to in-memory stores and the fixed-redirect
//! authenticator, then serves the four endpoints on a blocking thread-pool
//! HTTP server. Sites embedding the crate swap in their own `Authenticator`
//! and store backends instead.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroize;

use sqrl_crypto::GrcTree;
use sqrl_ssp::engine::EngineSettings;
use sqrl_ssp::{RedirectAuthenticator, SqrlEngine, SspConfig, SspServer};
use sqrl_store::{MemoryAuthStore, MemoryHoard};

fn main() -> anyhow::Result<()> {
    let config = SspConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    info!("sqrl-ssp starting");

    let mut aes_key = match config.aes_key()? {
        Some(key) => key,
        None => {
            warn!("no aes_key configured; using an ephemeral key (nuts will not survive restart)");
            let mut key = vec![0u8; 16];
            rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut key);
            key
        }
    };
    let tree = GrcTree::new(config.nut.counter_init, &aes_key)?;
    aes_key.zeroize();

    let engine = Arc::new(SqrlEngine::new(
        Arc::new(tree),
        Arc::new(MemoryHoard::new()),
        Arc::new(MemoryAuthStore::new()),
        Arc::new(RedirectAuthenticator::new(config.server.success_url.clone())),
        EngineSettings {
            nut_expiration: config.nut_expiration(),
            pag_expiration: config.pag_expiration(),
            root_path: config.server.root_path.clone(),
        },
    ));
    let server = SspServer::new(
        engine,
        config.server.root_path.clone(),
        config.server.host_override.clone(),
    );

    info!("listening on {}", config.server.listen_addr);
    rouille::start_server(config.server.listen_addr.clone(), move |request| {
        server.handle(request)
    });
}
