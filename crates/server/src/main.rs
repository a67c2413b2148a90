use color_eyre::eyre::WrapErr;
use sea_orm::Database;
use sigel_auth::AppResources;
use sigel_auth::api::start_webserver;
use sigel_auth::config::load_config;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "sigel_auth=info,sea_orm=warn,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; real deployments use the environment directly.
    let _ = dotenvy::dotenv();

    initialize_tracing();

    let config = Arc::new(load_config().wrap_err("Failed to load configuration")?);
    tracing::info!(
        listen_addr = %config.listen_addr,
        issuer_url = %config.issuer_url,
        grant_lifetime = config.oauth2.grant_lifetime,
        access_token_lifetime = config.oauth2.access_token_lifetime,
        "configuration loaded"
    );

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("Failed to connect to database")?,
    );

    let resources = AppResources::new(db, config.clone())
        .wrap_err("Invalid password hashing parameters")?;

    if let Some(bootstrap) = &config.bootstrap {
        resources
            .directory()
            .bootstrap_superuser(&bootstrap.email, &bootstrap.full_name, &bootstrap.password)
            .await
            .wrap_err("Failed to create bootstrap superuser")?;
    }

    start_webserver(resources).await?;
    Ok(())
}
