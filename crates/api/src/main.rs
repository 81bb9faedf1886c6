use std::sync::Arc;

use anyhow::Context;

use casahub_api::app::{build_app, services::AppServices};
use casahub_auth::Hs256Jwt;
use casahub_infra::{AppConfig, Stores, seed::seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    casahub_observability::init_with(config.log_format);

    for key in config.insecure_defaults() {
        tracing::warn!(key, "not set; using insecure dev default");
    }

    let stores = match &config.database_url {
        Some(url) => Stores::postgres(url).await.context("connecting to postgres")?,
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            Stores::in_memory()
        }
    };
    seed(&stores, &config.admin_email, &config.admin_password).await?;

    let services = Arc::new(AppServices::new(
        stores,
        Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes())),
        config.token_ttl,
    ));
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
