use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// The filter comes from `TEXTLENS_LOG`, then `RUST_LOG`, then a default of
/// `info,textlens=debug,tower_http=debug`. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = std::env::var("TEXTLENS_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info,textlens=debug,tower_http=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
