use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// `LOG_LEVEL` from the environment, `INFO` when unset.
pub fn level_from_env() -> Result<Level> {
    match std::env::var("LOG_LEVEL") {
        Ok(level) if !level.is_empty() => level
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid LOG_LEVEL '{level}'")),
        _ => Ok(Level::INFO),
    }
}
