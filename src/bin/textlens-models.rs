//! Print the model ids the configured upstream offers.
//!
//! Reads the same `AI_BASE_URL` / `AI_API_KEY` variables as the server, so it
//! doubles as a connectivity check before starting it.

use textlens::config::AppConfig;
use textlens::{logging, ChatProvider, Error, OpenAIProvider};

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = AppConfig::from_env()?;
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| Error::config("AI_API_KEY must be set to list models"))?;

    tracing::info!(base_url = %config.base_url, "querying models");
    let provider = OpenAIProvider::new_with_base_url(api_key, config.base_url, config.model)?;

    let models = provider.list_models().await.map_err(|e| {
        tracing::error!(
            error = %e,
            "listing models failed; AI_BASE_URL usually ends in /v1 and must not include /chat/completions"
        );
        e
    })?;

    for id in &models {
        println!("{id}");
    }
    tracing::info!(count = models.len(), "done");
    Ok(())
}
