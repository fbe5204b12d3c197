use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::header, middleware::NormalizePath, web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use showcase_backend::{
    background_task::start_purge_task,
    build_auth_providers, connect_store,
    constants::START_TIME,
    graceful_shutdown::{serve_until, shutdown_signal},
    middlewares::auth::AuthMiddleware,
    routes::configure_routes,
    seed::{load_seed_file, seed_store},
    settings::AppConfig,
    store::SharedStore,
    AppState,
};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }
    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

async fn seed_if_configured(config: &AppConfig, store: &SharedStore) -> anyhow::Result<()> {
    let Some(path) = config.seed_file.as_deref().filter(|p| !p.trim().is_empty()) else {
        return Ok(());
    };

    let seed = load_seed_file(path)?;
    seed_store(store, seed)
        .await
        .with_context(|| format!("Failed to seed the store from {}", path))?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    once_cell::sync::Lazy::force(&START_TIME);

    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(false);
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.is_production());
    tracing::info!("Loaded configuration: {:?}", config);

    let store = connect_store(&config)
        .await
        .context("Failed to open the document store")?;

    seed_if_configured(&config, &store).await?;

    let providers = build_auth_providers(&config, store.clone())
        .context("Failed to set up identity providers")?;
    let revocations = providers.revocations.clone();

    let app_state = web::Data::new(AppState::new(&config, store, providers));

    let server_addr = format!("{}:{}", config.host, config.port);
    let origins = config.cors_origins();

    tracing::info!(
        "🚀 Starting {} v{} on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(AuthMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(cors(&origins))
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run();

    tokio::spawn(start_purge_task(
        revocations,
        Duration::from_secs(config.revocation_purge_interval_secs),
    ));

    serve_until(server, shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
