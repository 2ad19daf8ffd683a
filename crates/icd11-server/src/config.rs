use icd11_client::{CacheConfig, EnhancedBrowserConfig, Icd11Config, ScrapingConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// WHO API credentials, endpoints and localisation
    #[serde(default)]
    pub icd11: Icd11Config,
    /// Result and token caches
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub enhanced_browser: EnhancedBrowserConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        let max_hours = CacheConfig::MAX_TTL_HOURS;
        if self.cache.ttl_hours == 0 || self.cache.ttl_hours > max_hours {
            return Err(format!("cache.ttl_hours must be between 1 and {max_hours}"));
        }
        let max_secs = max_hours * 3600;
        if self.cache.ancestors_ttl_secs == 0 || self.cache.ancestors_ttl_secs > max_secs {
            return Err(format!(
                "cache.ancestors_ttl_secs must be between 1 and {max_secs}"
            ));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err("cache.cleanup_interval_secs must be > 0".into());
        }
        if self.icd11.api_root.trim().is_empty() {
            return Err("icd11.api_root must not be empty".into());
        }
        if self.icd11.timeout_secs == 0 {
            return Err("icd11.timeout_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    /// Environment variables predating the `ICD11__SECTION__KEY` scheme.
    /// When set they override the file.
    pub const LEGACY_CLIENT_ID: &str = "ICD11_CLIENT_ID";
    pub const LEGACY_CLIENT_SECRET: &str = "ICD11_CLIENT_SECRET";
    pub const LEGACY_CACHE_DURATION: &str = "ICD11_CACHE_DURATION";
    pub const LEGACY_ENABLE_ENHANCED_BROWSER: &str = "ICD11_ENABLE_ENHANCED_BROWSER";
    pub const LEGACY_TIMEOUT: &str = "ICD11_TIMEOUT";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("icd11.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., ICD11__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("ICD11")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        apply_legacy_env(&mut merged, |key| std::env::var(key).ok())?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }

    /// Apply the legacy variables through `lookup`; blank values are ignored.
    pub fn apply_legacy_env(
        cfg: &mut AppConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), String> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(id) = get(LEGACY_CLIENT_ID) {
            cfg.icd11.client_id = id;
        }
        if let Some(secret) = get(LEGACY_CLIENT_SECRET) {
            cfg.icd11.client_secret = secret;
        }
        if let Some(hours) = get(LEGACY_CACHE_DURATION) {
            cfg.cache.ttl_hours = hours
                .parse()
                .map_err(|_| format!("{LEGACY_CACHE_DURATION} must be a number of hours"))?;
        }
        if let Some(timeout) = get(LEGACY_TIMEOUT) {
            cfg.icd11.timeout_secs = timeout
                .parse()
                .map_err(|_| format!("{LEGACY_TIMEOUT} must be a number of seconds"))?;
        }
        if let Some(flag) = get(LEGACY_ENABLE_ENHANCED_BROWSER) {
            cfg.enhanced_browser.enabled = parse_flag(&flag)
                .ok_or_else(|| format!("{LEGACY_ENABLE_ENHANCED_BROWSER} must be true or false"))?;
        }
        Ok(())
    }

    fn parse_flag(value: &str) -> Option<bool> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

}
