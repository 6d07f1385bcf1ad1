use std::env;

use crate::core::ledger::TransitionPolicy;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Directory for the file-backed store. Empty means in-memory only.
    pub data_dir: String,
    pub transition_policy: TransitionPolicy,
    pub seed_demo_users: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let transition_policy = match env::var("TRANSITION_POLICY").as_deref() {
            Ok("strict") => TransitionPolicy::Strict,
            Ok("permissive") | Err(_) => TransitionPolicy::Permissive,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid TRANSITION_POLICY: {other}"
                )))
            }
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_default(),
            transition_policy,
            seed_demo_users: parse_or_default("SEED_DEMO_USERS", false)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
