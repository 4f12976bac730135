use anyhow::Context;

use backoffice_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    backoffice_observability::init(&config.log);

    if config.jwt.uses_dev_secret() {
        tracing::warn!("jwt secret not set; using insecure dev default");
    }

    let app = backoffice_api::app::build_app_from_config(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
