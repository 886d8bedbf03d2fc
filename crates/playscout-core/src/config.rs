//! Configuration module
//!
//! Environment-driven configuration for the API process: server, database,
//! analysis retry profile and scoring provider settings.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const DEFAULT_PORT: u16 = 8000;
const MAX_CONNECTIONS: u32 = 10;
const ANALYSIS_TIMEOUT_SECS: u64 = 30;
const RETRY_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_MODEL_NAME: &str = "gpt-4-vision-preview";
const MOCK_MIN_DELAY_MS: u64 = 1000;
const MOCK_MAX_DELAY_MS: u64 = 3000;

/// Retry budget and backoff bounds for the analysis pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryProfile {
    pub max_retries: u32,
    pub base_delay_seconds: u64,
    pub max_delay_seconds: u64,
}

impl RetryProfile {
    pub const PRODUCTION: RetryProfile = RetryProfile {
        max_retries: 5,
        base_delay_seconds: 30,
        max_delay_seconds: 300,
    };

    pub const DEVELOPMENT: RetryProfile = RetryProfile {
        max_retries: 3,
        base_delay_seconds: 10,
        max_delay_seconds: 60,
    };

    pub const TESTING: RetryProfile = RetryProfile {
        max_retries: 2,
        base_delay_seconds: 1,
        max_delay_seconds: 10,
    };

    /// Profile for a deployment environment name. Only an explicit development
    /// or testing name selects the faster profiles; anything else gets the
    /// production budget.
    pub fn for_environment(environment: &str) -> Self {
        match environment.trim().to_lowercase().as_str() {
            "development" | "dev" => Self::DEVELOPMENT,
            "testing" | "test" => Self::TESTING,
            _ => Self::PRODUCTION,
        }
    }
}

impl Default for RetryProfile {
    fn default() -> Self {
        Self::PRODUCTION
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringProvider {
    /// In-process simulated scoring
    Mock,
    /// Remote scoring service over HTTP
    Http,
}

impl Display for ScoringProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ScoringProvider::Mock => write!(f, "mock"),
            ScoringProvider::Http => write!(f, "http"),
        }
    }
}

impl FromStr for ScoringProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(ScoringProvider::Mock),
            "http" => Ok(ScoringProvider::Http),
            _ => Err(anyhow::anyhow!("Invalid scoring provider: {}", s)),
        }
    }
}

/// Scoring collaborator settings
#[derive(Clone, Debug)]
pub struct ScoringConfig {
    pub provider: ScoringProvider,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub model_name: String,
    pub mock_min_delay_ms: u64,
    pub mock_max_delay_ms: u64,
    pub mock_failure_rate: f64,
}

impl ScoringConfig {
    /// Remote provider selected and fully configured.
    pub fn http_ready(&self) -> bool {
        self.provider == ScoringProvider::Http
            && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.api_base_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            provider: ScoringProvider::Mock,
            api_key: None,
            api_base_url: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            mock_min_delay_ms: MOCK_MIN_DELAY_MS,
            mock_max_delay_ms: MOCK_MAX_DELAY_MS,
            mock_failure_rate: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub server_port: u16,
    /// Postgres connection string; in-memory stores are used when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub retry: RetryProfile,
    pub analysis_timeout_seconds: u64,
    /// Period of the retry-job reconciliation loop. 0 disables it.
    pub retry_sweep_interval_seconds: u64,
    pub scoring: ScoringConfig,
}

impl Config {
    /// Load configuration from the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit_environment = lookup("ENVIRONMENT").or_else(|| lookup("APP_ENV"));
        let profile = explicit_environment
            .as_deref()
            .map(RetryProfile::for_environment)
            .unwrap_or_default();
        let environment = explicit_environment.unwrap_or_else(|| "development".to_string());

        // First key that is set and parses wins.
        let parse_first = |keys: &[&str], default: u64| -> u64 {
            keys.iter()
                .find_map(|key| lookup(key).and_then(|v| v.trim().parse().ok()))
                .unwrap_or(default)
        };

        let parse_or = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let retry = RetryProfile {
            max_retries: lookup("AI_ANALYSIS_MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(profile.max_retries),
            base_delay_seconds: parse_first(
                &["AI_ANALYSIS_BASE_DELAY_SECONDS", "AI_ANALYSIS_RETRY_DELAY_BASE"],
                profile.base_delay_seconds,
            ),
            max_delay_seconds: parse_first(
                &["AI_ANALYSIS_MAX_DELAY_SECONDS", "AI_ANALYSIS_MAX_DELAY"],
                profile.max_delay_seconds,
            ),
        };

        let provider = match lookup("AI_MODEL_PROVIDER") {
            Some(value) if !value.trim().is_empty() => value.trim().parse()?,
            _ => ScoringProvider::Mock,
        };

        let scoring = ScoringConfig {
            provider,
            api_key: lookup("AI_API_KEY").filter(|v| !v.is_empty()),
            api_base_url: lookup("AI_API_BASE_URL").filter(|v| !v.is_empty()),
            model_name: lookup("AI_MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            mock_min_delay_ms: parse_or("AI_MOCK_MIN_DELAY_MS", MOCK_MIN_DELAY_MS),
            mock_max_delay_ms: parse_or("AI_MOCK_MAX_DELAY_MS", MOCK_MAX_DELAY_MS),
            mock_failure_rate: lookup("AI_MOCK_FAILURE_RATE")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0),
        };

        let config = Config {
            environment,
            server_port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            retry,
            analysis_timeout_seconds: parse_or("AI_ANALYSIS_TIMEOUT_SECONDS", ANALYSIS_TIMEOUT_SECS),
            retry_sweep_interval_seconds: parse_or(
                "AI_RETRY_SWEEP_INTERVAL_SECONDS",
                RETRY_SWEEP_INTERVAL_SECS,
            ),
            scoring,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.retry.base_delay_seconds == 0 {
            return Err(anyhow::anyhow!(
                "AI_ANALYSIS_BASE_DELAY_SECONDS must be greater than zero"
            ));
        }

        if self.retry.max_delay_seconds < self.retry.base_delay_seconds {
            return Err(anyhow::anyhow!(
                "AI_ANALYSIS_MAX_DELAY_SECONDS ({}) must be >= AI_ANALYSIS_BASE_DELAY_SECONDS ({})",
                self.retry.max_delay_seconds,
                self.retry.base_delay_seconds
            ));
        }

        if self.analysis_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "AI_ANALYSIS_TIMEOUT_SECONDS must be greater than zero"
            ));
        }

        if let Some(url) = &self.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.scoring.mock_min_delay_ms > self.scoring.mock_max_delay_ms {
            return Err(anyhow::anyhow!(
                "AI_MOCK_MIN_DELAY_MS must be <= AI_MOCK_MAX_DELAY_MS"
            ));
        }

        if self.is_production()
            && self.scoring.provider == ScoringProvider::Http
            && !self.scoring.http_ready()
        {
            return Err(anyhow::anyhow!(
                "AI_MODEL_PROVIDER=http requires AI_API_KEY and AI_API_BASE_URL in production"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_use_production_retry_budget() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_seconds, 30);
        assert_eq!(config.retry.max_delay_seconds, 300);
        assert_eq!(config.server_port, 8000);
        assert!(config.database_url.is_none());
        assert_eq!(config.scoring.provider, ScoringProvider::Mock);
        assert_eq!(config.scoring.model_name, "gpt-4-vision-preview");
        assert_eq!(config.retry_sweep_interval_seconds, 60);
    }

    #[test]
    fn environment_selects_profile() {
        let prod = config_from(&[("ENVIRONMENT", "production")]).unwrap();
        assert_eq!(prod.retry, RetryProfile::PRODUCTION);
        assert!(prod.is_production());

        let test = config_from(&[("APP_ENV", "test")]).unwrap();
        assert_eq!(test.retry, RetryProfile::TESTING);

        let dev = config_from(&[("ENVIRONMENT", "Dev")]).unwrap();
        assert_eq!(dev.retry, RetryProfile::DEVELOPMENT);

        let unknown = config_from(&[("ENVIRONMENT", "staging")]).unwrap();
        assert_eq!(unknown.retry, RetryProfile::PRODUCTION);
    }

    #[test]
    fn legacy_delay_names_are_accepted() {
        let config = config_from(&[
            ("AI_ANALYSIS_RETRY_DELAY_BASE", "15"),
            ("AI_ANALYSIS_MAX_DELAY", "120"),
        ])
        .unwrap();
        assert_eq!(config.retry.base_delay_seconds, 15);
        assert_eq!(config.retry.max_delay_seconds, 120);

        let config = config_from(&[
            ("AI_ANALYSIS_BASE_DELAY_SECONDS", "20"),
            ("AI_ANALYSIS_RETRY_DELAY_BASE", "15"),
        ])
        .unwrap();
        assert_eq!(config.retry.base_delay_seconds, 20);
    }

    #[test]
    fn explicit_variables_override_profile() {
        let config = config_from(&[
            ("ENVIRONMENT", "production"),
            ("AI_ANALYSIS_MAX_RETRIES", "7"),
            ("AI_ANALYSIS_BASE_DELAY_SECONDS", "5"),
        ])
        .unwrap();
        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.retry.base_delay_seconds, 5);
        assert_eq!(config.retry.max_delay_seconds, 300);
    }

    #[test]
    fn rejects_zero_base_delay() {
        let err = config_from(&[("AI_ANALYSIS_BASE_DELAY_SECONDS", "0")]).unwrap_err();
        assert!(err.to_string().contains("AI_ANALYSIS_BASE_DELAY_SECONDS"));
    }

    #[test]
    fn rejects_cap_below_base() {
        let result = config_from(&[
            ("AI_ANALYSIS_BASE_DELAY_SECONDS", "30"),
            ("AI_ANALYSIS_MAX_DELAY_SECONDS", "10"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_postgres_database_url() {
        assert!(config_from(&[("DATABASE_URL", "mysql://localhost/db")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "postgres://localhost/playscout")]).is_ok());
    }

    #[test]
    fn incomplete_http_provider_rejected_only_in_production() {
        assert!(config_from(&[("AI_MODEL_PROVIDER", "http")]).is_ok());
        assert!(config_from(&[("ENVIRONMENT", "production"), ("AI_MODEL_PROVIDER", "http")]).is_err());

        let config = config_from(&[
            ("ENVIRONMENT", "production"),
            ("AI_MODEL_PROVIDER", "http"),
            ("AI_API_KEY", "secret"),
            ("AI_API_BASE_URL", "https://scoring.internal"),
        ])
        .unwrap();
        assert!(config.scoring.http_ready());
    }

    #[test]
    fn unknown_provider_is_an_error() {
        assert!(config_from(&[("AI_MODEL_PROVIDER", "quantum")]).is_err());
    }

    #[test]
    fn failure_rate_is_clamped() {
        let config = config_from(&[("AI_MOCK_FAILURE_RATE", "3.5")]).unwrap();
        assert_eq!(config.scoring.mock_failure_rate, 1.0);
    }
}
