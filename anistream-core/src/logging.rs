use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::LoggingConfig;

/// Initialize structured logging based on configuration.
///
/// Supports JSON (production) and pretty (development) formats with a
/// level taken from `RUST_LOG` when set, falling back to the config value.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.format.as_str() == "json" {
        let json_layer = fmt::layer().json().with_target(true).with_line_number(true);
        registry.with(json_layer).init();
    } else {
        let pretty_layer = fmt::layer().with_target(true);
        registry.with(pretty_layer).init();
    }

    Ok(())
}
