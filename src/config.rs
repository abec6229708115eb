//! Runtime configuration for the settlement engine.

use derive_getters::Getters;
use derive_more::{Display, Error};
use tracing::{debug, info};

/// Configuration error with the offending setting named in the message.
#[derive(Debug, Clone, Display, Error)]
#[display("Configuration error: {}", message)]
pub struct ConfigError {
    /// Human-readable description.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Engine configuration: AI strength, platform fee, and bet bounds.
#[derive(Debug, Clone, Getters)]
pub struct AppConfig {
    /// AI skill as a percentage (0-100).
    ai_skill_percent: u8,
    /// Platform fee on net winnings as a percentage (0-100).
    platform_fee_percent: u8,
    /// Smallest stake a game may be created with.
    min_bet: i64,
    /// Largest stake a game may be created with.
    max_bet: i64,
}

impl AppConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a percentage exceeds 100 or the bet
    /// bounds are inverted or non-positive.
    pub fn new(
        ai_skill_percent: u8,
        platform_fee_percent: u8,
        min_bet: i64,
        max_bet: i64,
    ) -> Result<Self, ConfigError> {
        if ai_skill_percent > 100 {
            return Err(ConfigError::new(format!(
                "AI skill must be 0-100, got {}",
                ai_skill_percent
            )));
        }
        if platform_fee_percent > 100 {
            return Err(ConfigError::new(format!(
                "Platform fee must be 0-100, got {}",
                platform_fee_percent
            )));
        }
        if min_bet <= 0 || max_bet < min_bet {
            return Err(ConfigError::new(format!(
                "Invalid bet bounds: min {} max {}",
                min_bet, max_bet
            )));
        }

        Ok(Self {
            ai_skill_percent,
            platform_fee_percent,
            min_bet,
            max_bet,
        })
    }

    /// Loads configuration from the environment, with defaults.
    ///
    /// Recognized variables: `GRIDSTAKES_AI_SKILL` (default 75),
    /// `GRIDSTAKES_FEE_PERCENT` (default 0), `GRIDSTAKES_MIN_BET`
    /// (default 10), `GRIDSTAKES_MAX_BET` (default 100000).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but unparseable, or
    /// the resulting values fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ai_skill_percent = env_or("GRIDSTAKES_AI_SKILL", 75u8)?;
        let platform_fee_percent = env_or("GRIDSTAKES_FEE_PERCENT", 0u8)?;
        let min_bet = env_or("GRIDSTAKES_MIN_BET", 10i64)?;
        let max_bet = env_or("GRIDSTAKES_MAX_BET", 100_000i64)?;

        let config = Self::new(ai_skill_percent, platform_fee_percent, min_bet, max_bet)?;
        info!(
            ai_skill_percent,
            platform_fee_percent, min_bet, max_bet, "Configuration loaded"
        );
        Ok(config)
    }

    /// The AI skill converted to a 0.0-1.0 probability.
    pub fn skill_probability(&self) -> f64 {
        f64::from(self.ai_skill_percent) / 100.0
    }
}

/// Reads an environment variable, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => {
            debug!(key, value = %raw, "Environment override");
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::new(format!("Failed to parse {}='{}'", key, raw)))
        }
        Err(_) => Ok(default),
    }
}
