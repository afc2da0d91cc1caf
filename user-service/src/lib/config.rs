use std::env;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

/// Secret used when nothing else is configured. Only fit for local development.
pub const DEVELOPMENT_JWT_SECRET: &str = "your-secret-key-change-in-production";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime; zero or negative values produce already-expired tokens.
    pub expiration_hours: i64,
}

impl JwtConfig {
    /// Token lifetime as a duration.
    ///
    /// # Errors
    /// * `Message` - `expiration_hours` does not fit in a duration
    pub fn token_validity(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_hours(self.expiration_hours).ok_or_else(|| {
            ConfigError::Message(format!(
                "jwt.expiration_hours out of range: {}",
                self.expiration_hours
            ))
        })
    }

    pub fn uses_development_secret(&self) -> bool {
        self.secret == DEVELOPMENT_JWT_SECRET
    }
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SERVER__HTTP_PORT, JWT__SECRET, JWT__EXPIRATION_HOURS)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .set_default("server.http_port", 8080)?
            .set_default("jwt.secret", DEVELOPMENT_JWT_SECRET)?
            .set_default("jwt.expiration_hours", 24)?
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()?;

        let config: Config = configuration.try_deserialize()?;

        Ok(config)
    }
}
