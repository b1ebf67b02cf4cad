use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. Shop events log under the `tradepost` target;
/// `RUST_LOG` overrides everything else.
pub fn init_logging(verbose: bool) {
    let (level_filter, level) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::INFO, "warn")
    };
    let shop_filter = Targets::new()
        .with_target("tradepost", level_filter)
        .with_target("sqlx", LevelFilter::WARN);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(shop_filter)
        .with(env_filter);
    if registry.try_init().is_err() {
        tracing::debug!("Logging already initialized");
    }
}
