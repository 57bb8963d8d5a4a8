use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared, immutable, through `AppState` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string, e.g. `sqlite://edulibrary.db`.
    pub database_url: String,
    // Directory holding uploaded PDF blobs.
    pub upload_dir: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Externally reachable base URL, used to build invitation links.
    pub public_url: String,
    // Key used to sign session tokens handed to clients.
    pub secret_key: String,
    // Upper bound for a single upload request body, in bytes.
    pub max_upload_bytes: usize,
    // bcrypt work factor for credential hashing.
    pub bcrypt_cost: u32,
    // Password given to the bootstrap admin account on first run.
    pub admin_password: String,
    // Recipient of new support ticket notifications.
    pub admin_email: String,
    pub mail: MailSettings,
    // Runtime environment marker. Controls log format and secret requirements.
    pub env: Env,
}

/// MailSettings
///
/// Outbound mail relay parameters. Delivery itself is delegated to the notifier.
#[derive(Clone, Debug)]
pub struct MailSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub default_sender: String,
}

/// Env
///
/// Defines the runtime context: pretty logs and development fallbacks locally,
/// JSON logs and mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEV_SECRET_KEY: &str = "edulibrary-local-development-secret";
const DEFAULT_MAX_UPLOAD_MB: usize = 20;

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            default_sender: "noreply@edulibrary.com".to_string(),
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup. Uses an in-memory database
    /// and the cheapest bcrypt cost so tests stay fast.
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            upload_dir: "uploads".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            public_url: "http://localhost:5000".to_string(),
            secret_key: DEV_SECRET_KEY.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            // Lowest cost bcrypt accepts.
            bcrypt_cost: 4,
            admin_password: "admin123".to_string(),
            admin_email: "admin@edulibrary.com".to_string(),
            mail: MailSettings::default(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment, falling back to defaults.
    ///
    /// # Panics
    /// Panics in production when `SECRET_KEY` is missing, or when a numeric variable
    /// cannot be parsed. The server must not start with a guessable signing key.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let secret_key = match env {
            Env::Production => {
                env::var("SECRET_KEY").expect("FATAL: SECRET_KEY must be set in production.")
            }
            Env::Local => env::var("SECRET_KEY").unwrap_or_else(|_| DEV_SECRET_KEY.to_string()),
        };

        let max_upload_mb: usize = parse_var("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);
        let defaults = MailSettings::default();

        Self {
            database_url: var_or("DATABASE_URL", "sqlite://edulibrary.db"),
            upload_dir: var_or("UPLOAD_FOLDER", "uploads"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:5000"),
            public_url: var_or("PUBLIC_URL", "http://localhost:5000"),
            secret_key,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST),
            admin_password: var_or("ADMIN_PASSWORD", "admin123"),
            admin_email: var_or("ADMIN_EMAIL", "admin@edulibrary.com"),
            mail: MailSettings {
                server: var_or("MAIL_SERVER", &defaults.server),
                port: parse_var("MAIL_PORT", defaults.port),
                username: var_or("MAIL_USERNAME", ""),
                password: var_or("MAIL_PASSWORD", ""),
                default_sender: var_or("MAIL_DEFAULT_SENDER", &defaults.default_sender),
            },
            env,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {} has an invalid value: {}", key, raw)),
        Err(_) => default,
    }
}
