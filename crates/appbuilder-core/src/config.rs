//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → 환경 변수 순서로 덮어씁니다.
//!
//! # 환경 변수
//!
//! - `APPBUILDER__SERVER__PORT` 형식으로 모든 키를 덮어쓸 수 있습니다.
//! - `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`: 기존 `.env` 키
//! - `DATABASE_URL`: 설정되면 개별 DB 키보다 우선합니다.
//! - `CORS_ORIGINS`: 쉼표로 구분된 origin 목록 (`server.cors_origins`)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CoreResult;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 실시간 구독 설정
    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// HTTP 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin. 비어 있으면 모든 origin 허용
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: default_request_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `host:port` 바인딩 문자열.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
///
/// `url`이 있으면 그대로 사용하고, 없으면 개별 필드로 연결 옵션을 만듭니다.
/// 둘 다 없으면 서버는 메모리 저장소로 동작합니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// 전체 연결 문자열
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// 최대 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            user: None,
            password: None,
            name: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// 데이터베이스 연결 정보가 설정되어 있는지 확인합니다.
    pub fn is_configured(&self) -> bool {
        self.url.is_some() || (self.host.is_some() && self.name.is_some())
    }

    /// 연결 획득 타임아웃.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// 실시간 구독(fan-out) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    /// 구독자 한 명에게 프레임을 쓰는 최대 시간 (밀리초)
    pub send_timeout_ms: u64,
    /// 이 횟수만큼 연속으로 전송 타임아웃이 나면 연결을 닫힌 것으로 간주
    pub max_send_failures: u32,
    /// 종료 시 연결 정리에 허용하는 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            max_send_failures: 3,
            shutdown_grace_secs: 10,
        }
    }
}

impl SubscriptionConfig {
    /// 전송 타임아웃.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// 종료 유예 시간.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn cors_origins_from_env() -> Option<Vec<String>> {
    let raw = std::env::var("CORS_ORIGINS").ok()?;
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    (!origins.is_empty()).then_some(origins)
}

impl AppConfig {
    /// 설정 파일(없어도 됨)과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("subscriptions.send_timeout_ms", 5_000)?
            .set_default("subscriptions.max_send_failures", 3)?
            .set_default("subscriptions.shutdown_grace_secs", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("APPBUILDER")
                    .separator("__")
                    .try_parsing(true),
            )
            // 기존 .env 키
            .set_override_option("database.host", std::env::var("DB_HOST").ok())?
            .set_override_option("database.port", std::env::var("DB_PORT").ok())?
            .set_override_option("database.user", std::env::var("DB_USER").ok())?
            .set_override_option("database.password", std::env::var("DB_PASSWORD").ok())?
            .set_override_option("database.name", std::env::var("DB_NAME").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.cors_origins", cors_origins_from_env())?;

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert!(!config.database.is_configured());
        assert_eq!(config.subscriptions.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.subscriptions.max_send_failures, 3);
    }

    #[test]
    fn test_database_is_configured() {
        let mut db = DatabaseConfig::default();
        db.host = Some("localhost".to_string());
        assert!(!db.is_configured());

        db.name = Some("appbuilder".to_string());
        assert!(db.is_configured());

        let db = DatabaseConfig {
            url: Some("postgres://localhost/appbuilder".to_string()),
            ..Default::default()
        };
        assert!(db.is_configured());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.subscriptions.shutdown_grace_secs, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cors_origins_from_env() {
        std::env::set_var("CORS_ORIGINS", " http://localhost:3000, ,https://app.example.com ");
        let origins = cors_origins_from_env();
        std::env::set_var("CORS_ORIGINS", " , ");
        let blank = cors_origins_from_env();
        std::env::remove_var("CORS_ORIGINS");

        assert_eq!(
            origins,
            Some(vec![
                "http://localhost:3000".to_string(),
                "https://app.example.com".to_string()
            ])
        );
        assert_eq!(blank, None);
    }
}
