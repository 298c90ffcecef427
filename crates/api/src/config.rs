//! Environment configuration.

use anyhow::Context;

/// Runtime configuration, read once at startup.
///
/// Optional values degrade features instead of failing startup: without an
/// identity provider the member endpoints answer 503, without an admin token
/// the admin surface is closed, and without a webhook token inbound webhooks
/// are accepted unverified (and logged as such).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub database_max_connections: u32,
    pub webhook_token: Option<String>,
    pub identity_provider_url: Option<String>,
    pub identity_service_key: Option<String>,
    pub admin_api_token: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let port = match env_opt("PORT") {
            Some(raw) => raw.parse().context("PORT must be a valid port number")?,
            None => 8080,
        };

        let database_max_connections = match env_opt("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            None => 10,
        };

        let cors_allowed_origins = env_opt("CORS_ALLOWED_ORIGINS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Ok(Self {
            database_url,
            port,
            database_max_connections,
            webhook_token: env_opt("WEBHOOK_TOKEN"),
            identity_provider_url: env_opt("IDENTITY_PROVIDER_URL"),
            identity_service_key: env_opt("IDENTITY_SERVICE_KEY"),
            admin_api_token: env_opt("ADMIN_API_TOKEN"),
            cors_allowed_origins,
        })
    }

    /// True when both halves of the identity provider config are present.
    pub fn identity_provider_configured(&self) -> bool {
        self.identity_provider_url.is_some() && self.identity_service_key.is_some()
    }
}

/// Read an env var, treating unset, empty and whitespace-only as absent.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "DATABASE_URL",
            "PORT",
            "DATABASE_MAX_CONNECTIONS",
            "WEBHOOK_TOKEN",
            "IDENTITY_PROVIDER_URL",
            "IDENTITY_SERVICE_KEY",
            "ADMIN_API_TOKEN",
            "CORS_ALLOWED_ORIGINS",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_the_database_url_is_set() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/scalazap");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.webhook_token.is_none());
        assert!(!config.identity_provider_configured());
        assert!(config.cors_allowed_origins.is_none());
    }

    #[test]
    #[serial]
    fn missing_database_url_fails() {
        clear_env();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn empty_values_read_as_absent() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/scalazap");
        std::env::set_var("WEBHOOK_TOKEN", "   ");
        std::env::set_var("IDENTITY_PROVIDER_URL", "");

        let config = Config::from_env().unwrap();
        assert!(config.webhook_token.is_none());
        assert!(!config.identity_provider_configured());
    }

    #[test]
    #[serial]
    fn cors_origins_split_and_trim() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/scalazap");
        std::env::set_var(
            "CORS_ALLOWED_ORIGINS",
            "https://app.scalazap.com , https://admin.scalazap.com,",
        );

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            Some(vec![
                "https://app.scalazap.com".to_string(),
                "https://admin.scalazap.com".to_string(),
            ])
        );
    }

    #[test]
    #[serial]
    fn identity_provider_requires_both_url_and_key() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/scalazap");
        std::env::set_var("IDENTITY_PROVIDER_URL", "https://auth.scalazap.com");

        let config = Config::from_env().unwrap();
        assert!(!config.identity_provider_configured());

        std::env::set_var("IDENTITY_SERVICE_KEY", "service-key");
        let config = Config::from_env().unwrap();
        assert!(config.identity_provider_configured());
    }
}
