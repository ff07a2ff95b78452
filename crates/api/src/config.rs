//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    /// Base domain for platform subdomains, e.g. "classhq.com" for
    /// {subdomain}.classhq.com routing
    pub base_domain: String,
    /// CNAME target customers point their custom domains at
    pub cname_target: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Admin surface
    pub admin_api_token: String,

    // Resolution cache
    pub cache_ttl_secs: u64,
    pub negative_cache_ttl_secs: u64,

    // Verification
    pub verification_max_attempts: i32,
    pub verification_batch_size: i64,

    // Fly.io (for custom domain SSL provisioning)
    pub fly_api_token: Option<String>,
    pub fly_app_name: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_domain = env::var("BASE_DOMAIN").unwrap_or_else(|_| "localhost".to_string());

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            cname_target: env::var("CNAME_TARGET")
                .unwrap_or_else(|_| format!("edge.{}", base_domain)),
            base_domain,

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),

            // Admin surface
            admin_api_token: {
                let token = env::var("ADMIN_API_TOKEN")
                    .map_err(|_| ConfigError::Missing("ADMIN_API_TOKEN"))?;
                if token.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "ADMIN_API_TOKEN must be at least 32 characters",
                    ));
                }
                token
            },

            // Resolution cache
            cache_ttl_secs: env::var("RESOLUTION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            negative_cache_ttl_secs: env::var("RESOLUTION_NEGATIVE_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Verification
            verification_max_attempts: env::var("VERIFICATION_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            verification_batch_size: env::var("VERIFICATION_BATCH_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .unwrap_or(25),

            // Fly.io
            fly_api_token: env::var("FLY_API_TOKEN").ok(),
            fly_app_name: env::var("FLY_APP_NAME").ok(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "ADMIN_API_TOKEN",
            "test-admin-token-must-be-at-least-32-chars",
        );
    }

    fn cleanup_config() {
        env::remove_var("DATABASE_URL");
        env::remove_var("ADMIN_API_TOKEN");
        env::remove_var("BASE_DOMAIN");
        env::remove_var("CNAME_TARGET");
    }

    #[test]
    fn test_admin_token_validation() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();

        // Missing token
        setup_minimal_config();
        env::remove_var("ADMIN_API_TOKEN");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("ADMIN_API_TOKEN"))));

        // Short token rejected
        env::set_var("ADMIN_API_TOKEN", "too-short");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::WeakSecret(_))));

        // Valid token accepted
        env::set_var(
            "ADMIN_API_TOKEN",
            "test-admin-token-must-be-at-least-32-chars",
        );
        assert!(Config::from_env().is_ok());

        cleanup_config();
    }

    #[test]
    fn test_cname_target_defaults_to_base_domain() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();

        setup_minimal_config();
        env::set_var("BASE_DOMAIN", "classhq.com");
        env::remove_var("CNAME_TARGET");

        let config = Config::from_env().unwrap();
        assert_eq!(config.base_domain, "classhq.com");
        assert_eq!(config.cname_target, "edge.classhq.com");

        cleanup_config();
    }
}
