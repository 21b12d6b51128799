/// Configuration management for the API server
///
/// Configuration comes from environment variables. A `.env` file in the
/// working directory is loaded first when present.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: any)
/// - `PRODUCTION`: Enables HSTS and strict headers (default: false)
/// - `PUBLIC_URL`: Base URL of the web client, used in email links
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for session tokens (required, 32+ chars)
/// - `MAIL_WEBHOOK_URL`: Mail delivery endpoint; mail is only logged when unset
/// - `MAIL_FROM`: Sender address (default: no-reply@collabtrack.local)
/// - `GOOGLE_USERINFO_URL`: Userinfo endpoint for federated sign-in
///
/// # Example
///
/// ```no_run
/// use collabtrack_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use collabtrack_shared::auth::federated::GOOGLE_USERINFO_URL;
use serde::{Deserialize, Serialize};
use std::env;

/// Minimum length of `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub federated: FederatedConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS header)
    pub production: bool,

    /// Base URL of the web client, without trailing slash
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing session tokens
    ///
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Delivery webhook; None logs mail instead of sending it
    pub webhook_url: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedConfig {
    pub userinfo_url: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not
    /// parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|value| parse_list(&value))
            .unwrap_or_default();

        let production = env::var("PRODUCTION")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        let public_url = env::var("PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let webhook_url = env::var("MAIL_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let from = env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@collabtrack.local".to_string());

        let userinfo_url =
            env::var("GOOGLE_USERINFO_URL").unwrap_or_else(|_| GOOGLE_USERINFO_URL.to_string());

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
                public_url,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            mail: MailConfig { webhook_url, from },
            federated: FederatedConfig { userinfo_url },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Link that lets someone join a project
    pub fn join_link(&self, project_id: uuid::Uuid) -> String {
        format!("{}/join/{}", self.api.public_url, project_id)
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify-email?token={}", self.api.public_url, token)
    }

    pub fn password_reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.api.public_url, token)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            production: false,
            public_url: "https://app.example.com".to_string(),
        },
        database: DatabaseConfig {
            url: "postgresql://localhost/test".to_string(),
            max_connections: 10,
        },
        jwt: JwtConfig {
            secret: "test-secret-key-at-least-32-bytes-long".to_string(),
        },
        mail: MailConfig {
            webhook_url: None,
            from: "no-reply@example.com".to_string(),
        },
        federated: FederatedConfig {
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_links_use_public_url() {
        let config = test_config();
        let project_id = uuid::Uuid::nil();

        assert_eq!(
            config.join_link(project_id),
            "https://app.example.com/join/00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            config.verification_link("abc"),
            "https://app.example.com/verify-email?token=abc"
        );
        assert_eq!(
            config.password_reset_link("abc"),
            "https://app.example.com/reset-password?token=abc"
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" https://a.example.com , ,https://b.example.com"),
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_secret_not_serialized() {
        let json = serde_json::to_value(test_config()).unwrap();
        assert!(json["jwt"].get("secret").is_none());
    }
}
