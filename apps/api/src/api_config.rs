use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use grantwell_application::AccessPolicy;
use grantwell_core::AppError;
use tracing_subscriber::EnvFilter;

const DEFAULT_EVENT_CHANNEL: &str = "grantwell.grant-events";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerBackendConfig {
    Memory,
    Postgres { database_url: String },
}

impl LedgerBackendConfig {
    fn parse(value: &str, database_url: Option<String>) -> Result<Self, AppError> {
        match value {
            "memory" => Ok(Self::Memory),
            "postgres" => {
                let database_url = database_url
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Validation(
                            "DATABASE_URL is required when LEDGER_BACKEND is 'postgres'".to_owned(),
                        )
                    })?;
                Ok(Self::Postgres { database_url })
            }
            other => Err(AppError::Validation(format!(
                "LEDGER_BACKEND must be either 'memory' or 'postgres', got '{other}'"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPublisherConfig {
    Log,
    Redis { redis_url: String, channel: String },
}

impl EventPublisherConfig {
    fn parse(
        value: &str,
        redis_url: Option<String>,
        channel: Option<String>,
    ) -> Result<Self, AppError> {
        match value {
            "log" => Ok(Self::Log),
            "redis" => {
                let redis_url = redis_url
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Validation(
                            "REDIS_URL is required when EVENT_PUBLISHER is 'redis'".to_owned(),
                        )
                    })?;
                let channel = channel
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_EVENT_CHANNEL.to_owned());
                Ok(Self::Redis { redis_url, channel })
            }
            other => Err(AppError::Validation(format!(
                "EVENT_PUBLISHER must be either 'log' or 'redis', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub ledger_backend: LedgerBackendConfig,
    pub event_publisher: EventPublisherConfig,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub access_policy: AccessPolicy,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let ledger_backend = LedgerBackendConfig::parse(
            env::var("LEDGER_BACKEND")
                .unwrap_or_else(|_| "memory".to_owned())
                .as_str(),
            env::var("DATABASE_URL").ok(),
        )?;
        let event_publisher = EventPublisherConfig::parse(
            env::var("EVENT_PUBLISHER")
                .unwrap_or_else(|_| "log".to_owned())
                .as_str(),
            env::var("REDIS_URL").ok(),
            env::var("EVENT_CHANNEL").ok(),
        )?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3101);

        let access_policy = access_policy_from(
            env::var("DECISION_CACHE_TTL_SECONDS").ok(),
            env::var("DEFAULT_GRANT_VALIDITY_HOURS").ok(),
            env::var("EMERGENCY_ACCESS_MAX_MINUTES").ok(),
        )?;

        Ok(Self {
            migrate_only,
            ledger_backend,
            event_publisher,
            frontend_url,
            api_host,
            api_port,
            access_policy,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

fn access_policy_from(
    cache_ttl_seconds: Option<String>,
    grant_validity_hours: Option<String>,
    emergency_max_minutes: Option<String>,
) -> Result<AccessPolicy, AppError> {
    let defaults = AccessPolicy::default();

    let decision_cache_ttl =
        positive_setting("DECISION_CACHE_TTL_SECONDS", cache_ttl_seconds)?.map(Duration::seconds);
    let default_grant_validity =
        positive_setting("DEFAULT_GRANT_VALIDITY_HOURS", grant_validity_hours)?
            .map(Duration::hours);
    let max_emergency_duration =
        positive_setting("EMERGENCY_ACCESS_MAX_MINUTES", emergency_max_minutes)?
            .map(Duration::minutes);

    Ok(AccessPolicy {
        decision_cache_ttl: decision_cache_ttl.unwrap_or(defaults.decision_cache_ttl),
        default_grant_validity: default_grant_validity.unwrap_or(defaults.default_grant_validity),
        max_emergency_duration: max_emergency_duration.unwrap_or(defaults.max_emergency_duration),
    })
}

fn positive_setting(name: &str, value: Option<String>) -> Result<Option<i64>, AppError> {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };

    let parsed = value
        .trim()
        .parse::<u32>()
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))?;
    if parsed == 0 {
        return Err(AppError::Validation(format!("{name} must be positive")));
    }

    Ok(Some(i64::from(parsed)))
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use grantwell_application::AccessPolicy;

    use super::{EventPublisherConfig, LedgerBackendConfig, access_policy_from};

    #[test]
    fn postgres_backend_requires_database_url() {
        assert!(LedgerBackendConfig::parse("postgres", None).is_err());
        assert!(LedgerBackendConfig::parse("postgres", Some(" ".to_owned())).is_err());
        assert!(LedgerBackendConfig::parse("sqlite", None).is_err());
        assert_eq!(
            LedgerBackendConfig::parse("memory", None).ok(),
            Some(LedgerBackendConfig::Memory)
        );
    }

    #[test]
    fn redis_publisher_defaults_channel() {
        let config = EventPublisherConfig::parse(
            "redis",
            Some("redis://127.0.0.1:6379".to_owned()),
            None,
        )
        .unwrap_or_else(|error| panic!("{error}"));

        assert_eq!(
            config,
            EventPublisherConfig::Redis {
                redis_url: "redis://127.0.0.1:6379".to_owned(),
                channel: "grantwell.grant-events".to_owned(),
            }
        );
        assert!(EventPublisherConfig::parse("redis", None, None).is_err());
    }

    #[test]
    fn policy_settings_override_defaults() {
        let policy = access_policy_from(Some("60".to_owned()), None, Some("30".to_owned()))
            .unwrap_or_else(|error| panic!("{error}"));

        assert_eq!(policy.decision_cache_ttl, Duration::seconds(60));
        assert_eq!(
            policy.default_grant_validity,
            AccessPolicy::default().default_grant_validity
        );
        assert_eq!(policy.max_emergency_duration, Duration::minutes(30));
    }

    #[test]
    fn zero_or_malformed_policy_settings_are_rejected() {
        assert!(access_policy_from(Some("0".to_owned()), None, None).is_err());
        assert!(access_policy_from(None, Some("soon".to_owned()), None).is_err());
    }
}
