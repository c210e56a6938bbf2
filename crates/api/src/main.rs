use std::sync::Arc;

use anyhow::Context;

use relay_api::app::{self, services};
use relay_infra::config::DispatchSettings;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relay_observability::init();

    let settings = DispatchSettings::from_env().context("invalid dispatch settings")?;
    let redis_url = std::env::var(services::ENV_REDIS_URL).ok();
    let services = services::build_services(&settings, redis_url)
        .await
        .context("failed to build dispatch services")?;

    let app = app::build_app(Arc::new(services));

    let bind_addr = std::env::var("RELAY_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
