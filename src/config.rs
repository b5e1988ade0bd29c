/*
 * Responsibility
 * - 環境変数 (.env 含む) から設定を読み込む: listen address / CORS / identity provider
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - 解析は from_lookup 経由 (テストでプロセス環境に触れない)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const DEFAULT_LEGACY_ISSUER_TEMPLATE: &str = "https://sts.windows.net/{tenant_id}/";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub auth_tenant_id: Uuid,
    pub auth_metadata_url: Url,
    pub auth_audiences: Vec<String>,
    pub auth_legacy_issuer_template: String,
    pub access_token_leeway_seconds: u64,

    pub trust_anchor_max_age: Duration,
    pub trust_anchor_min_refresh: Duration,
    pub trust_anchor_strict_freshness: bool,
    pub trust_anchor_fetch_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let cors_allowed_origins = split_list(lookup("CORS_ALLOWED_ORIGINS"));

        let auth_tenant_id = lookup("AUTH_TENANT_ID")
            .ok_or(ConfigError::Missing("AUTH_TENANT_ID"))?;
        let auth_tenant_id =
            Uuid::parse_str(auth_tenant_id.trim()).map_err(|_| ConfigError::Invalid("AUTH_TENANT_ID"))?;

        let auth_metadata_url = match lookup("AUTH_METADATA_URL") {
            Some(url) => Url::parse(url.trim()).map_err(|_| ConfigError::Invalid("AUTH_METADATA_URL"))?,
            None => {
                let authority =
                    lookup("AUTH_AUTHORITY").ok_or(ConfigError::Missing("AUTH_AUTHORITY"))?;
                discovery_url(&authority).ok_or(ConfigError::Invalid("AUTH_AUTHORITY"))?
            }
        };

        let auth_audiences = split_list(lookup("AUTH_AUDIENCES"));
        if auth_audiences.is_empty() {
            return Err(ConfigError::Missing("AUTH_AUDIENCES"));
        }

        let auth_legacy_issuer_template = lookup("AUTH_LEGACY_ISSUER_TEMPLATE")
            .unwrap_or_else(|| DEFAULT_LEGACY_ISSUER_TEMPLATE.to_string());

        let access_token_leeway_seconds = seconds(&lookup, "ACCESS_TOKEN_LEEWAY_SECONDS", 60)?;

        let trust_anchor_max_age =
            Duration::from_secs(seconds(&lookup, "TRUST_ANCHOR_MAX_AGE_SECONDS", 3600)?);
        if trust_anchor_max_age.is_zero() {
            return Err(ConfigError::Invalid("TRUST_ANCHOR_MAX_AGE_SECONDS"));
        }
        let trust_anchor_min_refresh =
            Duration::from_secs(seconds(&lookup, "TRUST_ANCHOR_MIN_REFRESH_SECONDS", 300)?);
        let trust_anchor_fetch_timeout =
            Duration::from_secs(seconds(&lookup, "TRUST_ANCHOR_FETCH_TIMEOUT_SECONDS", 10)?);

        let trust_anchor_strict_freshness = match lookup("TRUST_ANCHOR_STRICT_FRESHNESS") {
            None => false,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => return Err(ConfigError::Invalid("TRUST_ANCHOR_STRICT_FRESHNESS")),
            },
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth_tenant_id,
            auth_metadata_url,
            auth_audiences,
            auth_legacy_issuer_template,
            access_token_leeway_seconds,
            trust_anchor_max_age,
            trust_anchor_min_refresh,
            trust_anchor_strict_freshness,
            trust_anchor_fetch_timeout,
        })
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid(key)),
    }
}

/// `{authority}/.well-known/openid-configuration`
fn discovery_url(authority: &str) -> Option<Url> {
    let base = authority.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{base}/.well-known/openid-configuration")).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TENANT: &str = "0b7c4e2a-5d1f-4a8e-9c3b-2f6d8e1a7b90";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AUTH_TENANT_ID", TENANT),
            ("AUTH_AUTHORITY", "https://login.example.com/tenant/v2.0/"),
            ("AUTH_AUDIENCES", "api://gate, 9f1c0e55-0000-4000-8000-000000000001"),
        ]
    }

    #[test]
    fn defaults_are_applied() {
        let config = Config::from_lookup(lookup_from(&minimal())).unwrap();

        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(
            config.auth_metadata_url.as_str(),
            "https://login.example.com/tenant/v2.0/.well-known/openid-configuration"
        );
        assert_eq!(
            config.auth_audiences,
            ["api://gate", "9f1c0e55-0000-4000-8000-000000000001"]
        );
        assert_eq!(config.auth_legacy_issuer_template, DEFAULT_LEGACY_ISSUER_TEMPLATE);
        assert_eq!(config.access_token_leeway_seconds, 60);
        assert_eq!(config.trust_anchor_max_age, Duration::from_secs(3600));
        assert!(!config.trust_anchor_strict_freshness);
    }

    #[test]
    fn explicit_metadata_url_wins_over_authority() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "AUTH_AUTHORITY");
        pairs.push(("AUTH_METADATA_URL", "https://idp.example.com/custom/openid"));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(
            config.auth_metadata_url.as_str(),
            "https://idp.example.com/custom/openid"
        );
    }

    #[test]
    fn missing_and_invalid_values_fail() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "AUTH_AUDIENCES");
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Missing("AUTH_AUDIENCES"))
        ));

        let mut pairs = minimal();
        pairs.push(("AUTH_TENANT_ID", "contoso.onmicrosoft.com"));
        pairs.remove(0);
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid("AUTH_TENANT_ID"))
        ));

        let mut pairs = minimal();
        pairs.push(("TRUST_ANCHOR_STRICT_FRESHNESS", "maybe"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid("TRUST_ANCHOR_STRICT_FRESHNESS"))
        ));

        let mut pairs = minimal();
        pairs.push(("ACCESS_TOKEN_LEEWAY_SECONDS", "-5"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid("ACCESS_TOKEN_LEEWAY_SECONDS"))
        ));
    }
}
