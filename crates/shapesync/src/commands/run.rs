use tracing::warn;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = super::load(global)?;
    if loaded.config.routers.is_empty() {
        warn!("no routers configured, only static devices will be written");
    }

    let mut scheduler = super::scheduler(loaded);
    super::cancel_on_shutdown(scheduler.cancel_token());
    scheduler.run().await;
    Ok(())
}
