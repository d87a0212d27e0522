use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Server configuration, loaded from the TOML file named by `--config`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub message: MessageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expire_hours")]
    pub token_expire_hours: i64,
    /// Accept `demo_token_<uid>` tokens. Must stay off in production.
    #[serde(default)]
    pub allow_demo_tokens: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            tcp_port: default_tcp_port(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_ws_port() -> u16 {
    8081
}
fn default_tcp_port() -> u16 {
    8082
}
fn default_token_expire_hours() -> i64 {
    720
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_heartbeat_timeout() -> u64 {
    90
}
fn default_write_timeout() -> u64 {
    10
}
fn default_max_length() -> usize {
    4096
}
fn default_batch_size() -> i32 {
    100
}
fn default_true() -> bool {
    true
}
fn default_requests_per_second() -> u32 {
    20
}
fn default_burst() -> u32 {
    40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_fills_defaults() {
        let raw = r#"
            [database]
            url = "postgres://im:im@localhost/im"

            [redis]
            url = "redis://127.0.0.1/"

            [auth]
            jwt_secret = "secret"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.tcp_port, 8082);
        assert_eq!(config.server.ws_port, 8081);
        assert_eq!(config.auth.token_expire_hours, 720);
        assert!(!config.auth.allow_demo_tokens);
        assert_eq!(config.message.max_length, 4096);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn explicit_values_win() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            tcp_port = 9000

            [database]
            url = "postgres://im:im@localhost/im"

            [redis]
            url = "redis://127.0.0.1/"

            [auth]
            jwt_secret = "secret"
            allow_demo_tokens = true

            [message]
            max_length = 128
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.tcp_port, 9000);
        assert!(config.auth.allow_demo_tokens);
        assert_eq!(config.message.max_length, 128);
    }

    #[test]
    fn missing_required_section_fails() {
        let raw = r#"
            [redis]
            url = "redis://127.0.0.1/"
        "#;
        assert!(toml::from_str::<Config>(raw).is_err());
    }
}
