use anyhow::Context;

use guildgate_infra::{ServiceConfig, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("invalid configuration")?;
    guildgate_observability::init(&config.log.level, config.log.format);

    if config.uses_dev_secret() {
        tracing::warn!("GUILDGATE_JWT_SECRET not set; using insecure dev default");
    }

    let services = Services::connect_postgres(&config)
        .await
        .context("startup failed")?;
    let app = guildgate_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
