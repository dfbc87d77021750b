use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Frontdesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server configuration, constructed once per process from the
/// environment and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory uploaded files are stored under.
    pub files_dir: PathBuf,
    /// HS256 secret for access tokens and signed download URLs.
    pub token_secret: String,
    /// Access token lifetime in minutes.
    pub token_ttl_minutes: i64,
    /// Password-reset token lifetime in minutes.
    pub reset_ttl_minutes: i64,
    /// Signed download URL lifetime in seconds.
    pub signed_url_ttl_secs: i64,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read configuration from `FRONTDESK_*` environment variables,
    /// falling back to development defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_parsed("FRONTDESK_ADDR", SocketAddr::from(([127, 0, 0, 1], 8700))),
            db_path: std::env::var("FRONTDESK_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_db_path()),
            files_dir: std::env::var("FRONTDESK_FILES")
                .map(PathBuf::from)
                .unwrap_or_else(|_| app_data_dir().join("files")),
            token_secret: std::env::var("FRONTDESK_SECRET")
                .unwrap_or_else(|_| "frontdesk-dev-secret-do-not-use-in-production".into()),
            token_ttl_minutes: env_parsed("FRONTDESK_TOKEN_TTL_MINUTES", 30),
            reset_ttl_minutes: env_parsed("FRONTDESK_RESET_TTL_MINUTES", 60),
            signed_url_ttl_secs: env_parsed("FRONTDESK_SIGNED_URL_TTL_SECS", 300),
            max_upload_bytes: env_parsed("FRONTDESK_MAX_UPLOAD_BYTES", 25 * 1024 * 1024),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get the application data directory (~/Frontdesk/)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

fn default_db_path() -> PathBuf {
    app_data_dir().join("frontdesk.db")
}
