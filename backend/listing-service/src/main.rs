use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_service::contact::ContactRouter;
use listing_service::db::{create_pool, run_migrations};
use listing_service::security::jwt::TokenIssuer;
use listing_service::{routes, AppState, Config};
use object_storage::ObjectStorage;
use response_cache::{ResponseCache, SWEEP_INTERVAL_MS};

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_service=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("config error: {e}")))?;

    let pool = create_pool(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;

    if !config.is_production() {
        if let Err(e) = run_migrations(&pool).await {
            tracing::warn!("Migrations failed: {}", e);
        }
    }

    let contacts = ContactRouter::new(
        config.contact.whatsapp_a.clone(),
        config.contact.whatsapp_b.clone(),
    )
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let storage = ObjectStorage::new()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let cache = ResponseCache::new();
    let tokens = TokenIssuer::new(&config.jwt);

    let state = AppState {
        db: pool,
        cache: cache.clone(),
        storage,
        contacts,
        tokens,
    };

    // Periodic eviction of expired cache entries
    {
        let cache = cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(SWEEP_INTERVAL_MS));
            loop {
                ticker.tick().await;
                let evicted = cache.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, "cache sweep");
                }
            }
        });
    }

    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Listing service listening on {}", bind_addr);

    let server_state = state.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(server_state.clone()))
            .configure(|cfg| routes::configure_routes(cfg, &server_state))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
