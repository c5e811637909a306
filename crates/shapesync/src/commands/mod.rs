//! Command handlers and the startup steps they share.

pub mod check;
pub mod once;
pub mod run;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shapesync_config::{base_dir, config_path, load_config};
use shapesync_core::{HttpConnector, Scheduler, StaticRegistry, SyncConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Validated config plus the static registry as it stood at startup.
pub struct Loaded {
    pub path: PathBuf,
    pub config: SyncConfig,
    pub registry: StaticRegistry,
}

/// Read the config file and the static device file.
///
/// A malformed static file is fatal here; later cycles keep the last good copy.
pub fn load(global: &GlobalOpts) -> Result<Loaded, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    debug!(path = %path.display(), "loading config");

    let config = load_config(&path)?.to_sync_config(&base_dir(&path))?;
    let registry = StaticRegistry::load(&config.static_devices, &config.static_prefix).map_err(
        |source| CliError::StaticDevices {
            path: config.static_devices.clone(),
            source,
        },
    )?;

    Ok(Loaded {
        path,
        config,
        registry,
    })
}

pub fn scheduler(loaded: Loaded) -> Scheduler<HttpConnector> {
    let connector = HttpConnector::new(&loaded.config.tls, loaded.config.fetch_timeout);
    Scheduler::new(loaded.config, connector, loaded.registry)
}

/// Cancel `token` on Ctrl-C or SIGTERM.
pub fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
