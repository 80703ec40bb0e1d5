use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError};

/// Install the JSON log subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`. Token contents are never
/// logged; authentication events carry `jti`, `user_id` and `token_type` only.
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init_telemetry(default_filter: &str) -> Result<(), TryInitError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
}
