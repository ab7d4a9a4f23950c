use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use securebank::application::session::SessionManager;
use securebank::data::session_store::{FileSessionStore, InMemorySessionStore};
use securebank::data::transaction_repository::InMemoryTransactionRepository;
use securebank::data::user_repository::InMemoryUserRepository;
use securebank::domain::repository::SessionStore;
use securebank::domain::user::SeedUser;
use securebank::infrastructure::config::AppConfig;
use securebank::infrastructure::geolocation::{DisabledGeoLocator, GeoLocator, HttpGeoLocator};
use securebank::infrastructure::logging::init_logging;
use securebank::presentation::auth::{login, logout, register};
use securebank::presentation::handlers::{
    AppState, admin_deposit, cancel_transaction, confirm_transaction, dashboard, health_check,
    initiate_transaction, list_transactions, lookup_account, me, pending_transaction,
};
use securebank::presentation::middleware::{
    JwtAuthMiddleware, RequestIdMiddleware, TimingMiddleware,
};

#[instrument(skip(state))]
async fn seed_users(state: &AppState, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seeds: Vec<SeedUser> =
        serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))?;

    let mut created = 0;
    for seed in seeds {
        if state.auth_service.seed_user(seed).await?.is_some() {
            created += 1;
        }
    }
    Ok(created)
}

fn cors(origin: Option<&str>) -> Cors {
    match origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["x-request-id", "x-response-time"])
            .max_age(3600),
        None => Cors::permissive(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_logging(&config.log_filter);
    info!("Logging initialized successfully");
    config.log_fallbacks();

    let store: Arc<dyn SessionStore> = match &config.session_file {
        Some(path) => {
            let store = FileSessionStore::new(path.clone());
            info!(path = %store.path().display(), "Using file-backed session store");
            Arc::new(store)
        }
        None => {
            info!("Using in-memory session store");
            Arc::new(InMemorySessionStore::new())
        }
    };
    let sessions = Arc::new(SessionManager::new(store));
    let restored = sessions.restore().await.context("restoring sessions")?;
    info!(restored, "Sessions restored");

    let geolocator: Arc<dyn GeoLocator> = match &config.geo_lookup_url {
        Some(url) => {
            info!(url = %url, "IP geolocation enabled");
            Arc::new(HttpGeoLocator::new(url.clone(), config.geo_lookup_timeout))
        }
        None => {
            info!("IP geolocation disabled");
            Arc::new(DisabledGeoLocator)
        }
    };

    info!("Initializing application state");
    let state = web::Data::new(AppState::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryTransactionRepository::new()),
        sessions.clone(),
        geolocator,
        config.geo_lookup_timeout,
        config.jwt_secret.clone(),
    ));

    match &config.seed_file {
        Some(path) => {
            let created = seed_users(&state, path).await?;
            info!(created, "Seed users loaded");
        }
        None => warn!("SEED_FILE not set; starting with no users"),
    }

    let jwt_secret = config.jwt_secret.clone();
    let cors_origin = config.cors_origin.clone();

    info!("Configuring HTTP server");
    let server = HttpServer::new(move || {
        tracing::trace!("Creating new application instance");
        App::new()
            .app_data(state.clone())
            .wrap(JwtAuthMiddleware::new(jwt_secret.clone(), sessions.clone()))
            .wrap(cors(cors_origin.as_deref()))
            .wrap(TimingMiddleware)
            .wrap(RequestIdMiddleware)
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health_check))
                    .route("/auth/register", web::post().to(register))
                    .route("/auth/login", web::post().to(login))
                    .route("/auth/logout", web::post().to(logout))
                    .route("/me", web::get().to(me))
                    .route("/dashboard", web::get().to(dashboard))
                    .route("/transactions", web::get().to(list_transactions))
                    .route(
                        "/accounts/lookup/{account_number}",
                        web::get().to(lookup_account),
                    )
                    .route("/transactions/initiate", web::post().to(initiate_transaction))
                    .route("/transactions/pending", web::get().to(pending_transaction))
                    .route("/transactions/confirm", web::post().to(confirm_transaction))
                    .route("/transactions/cancel", web::post().to(cancel_transaction))
                    .route("/admin/deposits", web::post().to(admin_deposit)),
            )
    });

    let bind_addr = config.bind_addr();
    info!(address = %bind_addr, "Binding server to address");
    let server = server
        .bind((config.host.as_str(), config.port))
        .with_context(|| format!("binding {}", bind_addr))?;

    info!(address = %bind_addr, "Starting HTTP server");
    server.run().await?;
    Ok(())
}
