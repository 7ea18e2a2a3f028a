use crate::{api, config::Config, registry::Registry};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
    pub bind: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration can't be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = Config::load(&args.config)?;
    let bind = config.bind_address(args.bind.as_deref());

    log_startup(&args, &config, &bind);

    let registry = Arc::new(Registry::from_config(&config));

    api::new(&bind, registry).await
}

fn log_startup(args: &Args, config: &Config, bind: &str) {
    let short_hash = crate::GIT_COMMIT_HASH.get(..7).unwrap_or(crate::GIT_COMMIT_HASH);
    let channels = config
        .channels
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    info!(
        "{} {} ({}) config: {}, listen: {}, enforce: {}, channels: [{}]",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash,
        args.config.display(),
        bind,
        config.enforce,
        channels
    );
}
