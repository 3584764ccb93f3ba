use anyhow::Context;
use fixture_audit::{
    config::{report_dotenv, Config},
    handler::{router, AppState},
    Client,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, dotenv) = Config::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    report_dotenv(&dotenv);

    // A client that fails to build is reported per request, the server still starts.
    let client = match config.api_key() {
        Some(api_key) => {
            let built = Client::builder(api_key.to_owned())
                .base_url(config.base_url.clone())
                .build();
            if let Err(e) = &built {
                tracing::error!(error = %e, "failed to build Messages API client, evaluations will fail");
            }
            Some(built)
        }
        None => {
            tracing::warn!("CLAUDE_API_KEY is not set, evaluations will fail until it is");
            None
        }
    };

    let app = router(&config.route, AppState::from_build(client));
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    tracing::info!(address = %config.listen, route = %config.route, "fixture audit listening");
    axum::serve(listener, app).await?;

    Ok(())
}
