use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub ttl_minutes: i64,
    pub length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub dns_check: bool,
    pub dns_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub per_page: i64,
    pub token: TokenConfig,
    pub email: EmailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            host: "0.0.0.0".into(),
            port: 8080,
            per_page: 5,
            token: TokenConfig {
                ttl_minutes: 7,
                length: 80,
            },
            email: EmailConfig {
                dns_check: true,
                dns_timeout_secs: 3,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let database_url = parsed("DATABASE_URL").filter(|v| !v.is_empty());
        let per_page = parsed("USERS_PER_PAGE")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.per_page);
        if per_page > 1000 {
            anyhow::bail!("USERS_PER_PAGE must not exceed 1000, got {}", per_page);
        }

        Ok(Self {
            database_url,
            max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_connections),
            host: parsed("APP_HOST").unwrap_or(defaults.host),
            port: parsed("APP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            per_page,
            token: TokenConfig {
                ttl_minutes: parsed("API_TOKEN_TTL_MINUTES")
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.token.ttl_minutes),
                length: parsed("API_TOKEN_LENGTH")
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|n| *n >= 32)
                    .unwrap_or(defaults.token.length),
            },
            email: EmailConfig {
                dns_check: parsed("EMAIL_DNS_CHECK")
                    .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                    .unwrap_or(defaults.email.dns_check),
                dns_timeout_secs: parsed("EMAIL_DNS_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.email.dns_timeout_secs),
            },
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config_from(&[]).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.per_page, 5);
        assert_eq!(cfg.token.ttl_minutes, 7);
        assert_eq!(cfg.token.length, 80);
        assert!(cfg.email.dns_check);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_overrides() {
        let cfg = config_from(&[
            ("DATABASE_URL", "postgres://u:p@db/accounts"),
            ("APP_PORT", "9000"),
            ("USERS_PER_PAGE", "20"),
            ("API_TOKEN_TTL_MINUTES", "60"),
            ("EMAIL_DNS_CHECK", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://u:p@db/accounts"));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.per_page, 20);
        assert_eq!(cfg.token.ttl_minutes, 60);
        assert!(!cfg.email.dns_check);
    }

    #[test]
    fn garbage_numbers_fall_back_to_defaults() {
        let cfg = config_from(&[
            ("APP_PORT", "eighty"),
            ("USERS_PER_PAGE", "-3"),
            ("API_TOKEN_LENGTH", "8"),
            ("DATABASE_URL", "   "),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.per_page, 5);
        assert_eq!(cfg.token.length, 80);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn rejects_oversized_page() {
        assert!(config_from(&[("USERS_PER_PAGE", "5000")]).is_err());
    }
}
