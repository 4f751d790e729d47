// Configuration module entry point
// Loads the startup configuration and builds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::Config;

/// Environment variable naming the config file (without extension)
pub const CONFIG_PATH_ENV: &str = "SHAREBIN_CONFIG";

/// Bare variable honoured for the storage root, overriding everything else
pub const STORAGE_ENV: &str = "STORAGE";

impl Config {
    /// Load configuration from `$SHAREBIN_CONFIG`, defaulting to "config"
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest priority first: built-in defaults, the optional file,
    /// `SHAREBIN__SECTION__KEY` variables, then `STORAGE`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let temp_dir = std::env::temp_dir().to_string_lossy().into_owned();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SHAREBIN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_timeout", 10)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("http.default_scheme", "http")?
            .set_default("storage.root", temp_dir)?
            .set_default("storage.id_length", 8)?
            .set_default("storage.exclusive_create", false)?
            .set_default("storage.report_denied_writes", false)?
            .set_default("manual.path", "HOWTO")?
            .set_override_option("storage.root", std::env::var(STORAGE_ENV).ok())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
