// src/config.rs

use std::{collections::BTreeMap, env, net::SocketAddr, str::FromStr};

use chrono::Duration;
use dotenvy::dotenv;

use crate::{
    models::question::{Category, Difficulty},
    placement::{
        bank::SamplingCriteria,
        level::{LevelPolicy, PolicyError},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Tunables of the placement engine.
#[derive(Debug, Clone, Default)]
pub struct PlacementSettings {
    pub policy: LevelPolicy,
    pub sampling: SamplingCriteria,
    /// Extra time allowed past the summed question allocations.
    /// `None` disables the server-side deadline.
    pub time_limit_grace: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub log_dir: String,
    /// Optional JSON file of questions loaded into an empty bank at startup.
    pub seed_file: Option<String>,
    pub placement: PlacementSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let policy = LevelPolicy {
            advanced_min: parse_var(&lookup, "PLACEMENT_ADVANCED_MIN", 80)?,
            intermediate_min: parse_var(&lookup, "PLACEMENT_INTERMEDIATE_MIN", 60)?,
            strength_min: parse_var(&lookup, "PLACEMENT_STRENGTH_MIN", 75)?,
            improvement_below: parse_var(&lookup, "PLACEMENT_IMPROVEMENT_BELOW", 50)?,
        };
        policy.validate()?;

        let mut per_difficulty = BTreeMap::new();
        for (difficulty, name, default) in [
            (Difficulty::Easy, "PLACEMENT_EASY_COUNT", 4),
            (Difficulty::Medium, "PLACEMENT_MEDIUM_COUNT", 4),
            (Difficulty::Hard, "PLACEMENT_HARD_COUNT", 2),
        ] {
            let count: usize = parse_var(&lookup, name, default)?;
            if count > 0 {
                per_difficulty.insert(difficulty, count);
            }
        }

        let per_category = match lookup("PLACEMENT_CATEGORY_COUNTS") {
            Some(raw) => parse_category_counts(&raw)?,
            None => BTreeMap::new(),
        };

        let sampling = SamplingCriteria {
            per_difficulty,
            per_category,
            min_questions: parse_var(&lookup, "PLACEMENT_MIN_QUESTIONS", 5)?,
        };
        if sampling.target() < sampling.min_questions {
            return Err(ConfigError::Invalid {
                name: "PLACEMENT_MIN_QUESTIONS",
                value: sampling.min_questions.to_string(),
            });
        }

        let enforce: bool = parse_var(&lookup, "PLACEMENT_ENFORCE_TIME_LIMIT", false)?;
        let grace_secs: i64 = parse_var(&lookup, "PLACEMENT_TIME_GRACE_SECS", 30)?;
        let time_limit_grace = enforce.then(|| Duration::seconds(grace_secs.max(0)));

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            jwt_secret,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            bind_addr: parse_var(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            seed_file: lookup("PLACEMENT_SEED_FILE"),
            placement: PlacementSettings {
                policy,
                sampling,
                time_limit_grace,
            },
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

/// Parses `"programming:2,database:1"`.
fn parse_category_counts(raw: &str) -> Result<BTreeMap<Category, usize>, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name: "PLACEMENT_CATEGORY_COUNTS",
        value: raw.to_string(),
    };

    let mut counts = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (category, count) = entry.split_once(':').ok_or_else(invalid)?;
        let category: Category = category.trim().parse().map_err(|_| invalid())?;
        let count: usize = count.trim().parse().map_err(|_| invalid())?;
        counts.insert(category, count);
    }
    Ok(counts)
}
