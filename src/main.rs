use edulibrary::{
    AppState,
    auth::{InMemorySessionStore, SessionState, hash_password},
    config::{AppConfig, Env},
    create_router,
    models::NewUser,
    notifier::{LogMailer, NotifierState},
    repository::{Repository, RepositoryState, SqliteRepository},
    storage::{LocalStorage, StorageService, StorageState},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, blob store, mailer, then the HTTP
/// server. Any startup failure is fatal.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise a verbose local default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "edulibrary=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database (SQLite file created on first run, schema migrated)
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("FATAL: DATABASE_URL is not a valid SQLite URL.")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .expect("FATAL: Failed to open the SQLite database. Check DATABASE_URL.");

    let sqlite_repo = SqliteRepository::new(pool);
    sqlite_repo
        .migrate()
        .await
        .expect("FATAL: Database migration failed.");

    // 4. Bootstrap admin account (first run only)
    let admin_hash = hash_password(config.admin_password.clone(), config.bcrypt_cost)
        .await
        .expect("FATAL: Could not hash the bootstrap admin password.");
    let created = sqlite_repo
        .ensure_bootstrap_admin(NewUser {
            username: "admin".to_string(),
            email: config.admin_email.clone(),
            password_hash: admin_hash,
            is_admin: true,
        })
        .await
        .expect("FATAL: Could not create the bootstrap admin account.");
    if created {
        tracing::warn!("Created bootstrap admin account 'admin'; change its password.");
    }

    let repo = Arc::new(sqlite_repo) as RepositoryState;

    // 5. Blob store (upload directory created if missing)
    let local_storage = LocalStorage::new(&config.upload_dir);
    local_storage
        .ensure_root()
        .await
        .expect("FATAL: Could not create the upload directory. Check UPLOAD_FOLDER.");
    tracing::info!("Storing uploads in {}", local_storage.root().display());
    let storage = Arc::new(local_storage) as StorageState;

    // 6. Sessions and mail
    let sessions = Arc::new(InMemorySessionStore::new()) as SessionState;
    if config.mail.username.is_empty() || config.mail.password.is_empty() {
        tracing::warn!("MAIL_USERNAME/MAIL_PASSWORD not set; notification emails will not be sent.");
    }
    let notifier = Arc::new(LogMailer::new(config.mail.clone())) as NotifierState;

    // 7. Unified state, router and server
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        sessions,
        notifier,
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Could not bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
