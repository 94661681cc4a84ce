use ferry_server::LogConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the configured filter.
pub const LOG_ENV: &str = "FERRY_LOG";

pub fn init_logging(config: &LogConfig, verbose: bool) {
    let fallback = if verbose { "debug" } else { config.filter.as_str() };
    let env = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    // stdout is reserved for command output.
    let base = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env);
    // Fails only if a subscriber is already installed, which is fine.
    let _ = if config.json {
        registry.with(base.json()).try_init()
    } else {
        registry.with(base.compact()).try_init()
    };
}
