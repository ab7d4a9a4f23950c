use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GEO_TIMEOUT_MS: u64 = 1500;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_file: Option<PathBuf>,
    pub seed_file: Option<PathBuf>,
    pub geo_lookup_url: Option<String>,
    pub geo_lookup_timeout: Duration,
    pub cors_origin: Option<String>,
    pub log_filter: String,
    /// Defaults substituted for missing or invalid settings, reported by
    /// [`AppConfig::log_fallbacks`] once logging is up.
    pub fallbacks: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jwt_secret: Uuid::new_v4().to_string(),
            session_file: None,
            seed_file: None,
            geo_lookup_url: None,
            geo_lookup_timeout: Duration::from_millis(DEFAULT_GEO_TIMEOUT_MS),
            cors_origin: None,
            log_filter: "info".to_string(),
            fallbacks: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut fallbacks = Vec::new();

        let port = match non_empty("BANK_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                fallbacks.push(format!(
                    "BANK_PORT '{}' is not a valid port; using {}",
                    raw, DEFAULT_PORT
                ));
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let jwt_secret = non_empty("JWT_SECRET").unwrap_or_else(|| {
            fallbacks.push(
                "JWT_SECRET not set; generating ephemeral secret (tokens will not survive restart)"
                    .to_string(),
            );
            defaults.jwt_secret.clone()
        });

        let geo_lookup_timeout = non_empty("GEO_LOOKUP_TIMEOUT_MS")
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.geo_lookup_timeout);

        Self {
            host: non_empty("BANK_HOST").unwrap_or(defaults.host),
            port,
            jwt_secret,
            session_file: non_empty("SESSION_FILE").map(PathBuf::from),
            seed_file: non_empty("SEED_FILE").map(PathBuf::from),
            geo_lookup_url: non_empty("GEO_LOOKUP_URL"),
            geo_lookup_timeout,
            cors_origin: non_empty("CORS_ORIGIN"),
            log_filter: non_empty("LOG_LEVEL").unwrap_or(defaults.log_filter),
            fallbacks,
        }
    }

    /// Call after `init_logging`; config is read before a subscriber exists.
    pub fn log_fallbacks(&self) {
        for fallback in &self.fallbacks {
            warn!("{}", fallback);
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert!(!config.jwt_secret.is_empty());
        assert!(config.session_file.is_none());
        assert!(config.geo_lookup_url.is_none());
        assert_eq!(config.geo_lookup_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_reads_values_from_environment() {
        let config = config_from(&[
            ("BANK_HOST", "0.0.0.0"),
            ("BANK_PORT", "9000"),
            ("JWT_SECRET", "s3cret"),
            ("SESSION_FILE", "/tmp/sessions.json"),
            ("GEO_LOOKUP_URL", "https://ipapi.co/{ip}/json/"),
            ("GEO_LOOKUP_TIMEOUT_MS", "250"),
            ("CORS_ORIGIN", "http://localhost:5173"),
        ]);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/sessions.json")));
        assert_eq!(config.geo_lookup_timeout, Duration::from_millis(250));
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:5173"));
    }

    #[test]
    fn test_invalid_port_and_blank_values_fall_back() {
        let config = config_from(&[("BANK_PORT", "not-a-port"), ("SESSION_FILE", "  ")]);
        assert_eq!(config.port, 8080);
        assert!(config.session_file.is_none());
        assert!(config.fallbacks.iter().any(|f| f.starts_with("BANK_PORT 'not-a-port'")));
    }

    #[test]
    fn test_missing_secret_is_recorded_for_later_warning() {
        let config = config_from(&[]);
        assert_eq!(config.fallbacks.len(), 1);
        assert!(config.fallbacks[0].starts_with("JWT_SECRET not set"));

        let config = config_from(&[("JWT_SECRET", "s3cret")]);
        assert!(config.fallbacks.is_empty());
    }
}
