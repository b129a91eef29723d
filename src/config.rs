//! Game configuration.
//!
//! Every rule constant the engine consults lives here. Defaults match the
//! classic 13-dice game; deployments can override them from the environment.

use serde::{Deserialize, Serialize};

/// Rule constants and limits shared by every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Banked brains needed to win
    pub win_threshold: u32,

    /// Dice rolled per step (held footsteps count toward this)
    pub dice_per_roll: usize,

    /// Shotguns in one turn that end it with nothing banked
    pub hazards_to_eliminate: u32,

    /// Players required before a game can start
    pub min_players_to_start: usize,

    /// Maximum players in one lobby
    pub max_players: usize,

    /// Length of generated lobby codes
    pub code_length: usize,

    /// Attempts at finding an unused lobby code before giving up
    pub max_code_attempts: usize,

    /// Maximum display name length (in characters, before any suffix)
    pub max_name_len: usize,

    /// Highest numeric suffix tried when de-duplicating names
    pub max_name_suffix: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_threshold: 13,
            dice_per_roll: 3,
            hazards_to_eliminate: 3,
            min_players_to_start: 2,
            max_players: 8,
            code_length: 5,
            max_code_attempts: 64,
            max_name_len: 16,
            max_name_suffix: 99,
        }
    }
}

impl GameConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration fails [`GameConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            win_threshold: parse_env_or("BRAINDICE_WIN_THRESHOLD", defaults.win_threshold),
            dice_per_roll: parse_env_or("BRAINDICE_DICE_PER_ROLL", defaults.dice_per_roll),
            hazards_to_eliminate: parse_env_or(
                "BRAINDICE_HAZARDS_TO_ELIMINATE",
                defaults.hazards_to_eliminate,
            ),
            min_players_to_start: parse_env_or(
                "BRAINDICE_MIN_PLAYERS",
                defaults.min_players_to_start,
            ),
            max_players: parse_env_or("BRAINDICE_MAX_PLAYERS", defaults.max_players),
            code_length: parse_env_or("BRAINDICE_CODE_LENGTH", defaults.code_length),
            max_code_attempts: parse_env_or(
                "BRAINDICE_MAX_CODE_ATTEMPTS",
                defaults.max_code_attempts,
            ),
            max_name_len: parse_env_or("BRAINDICE_MAX_NAME_LEN", defaults.max_name_len),
            max_name_suffix: parse_env_or("BRAINDICE_MAX_NAME_SUFFIX", defaults.max_name_suffix),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.win_threshold == 0 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_WIN_THRESHOLD".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.dice_per_roll == 0 || self.dice_per_roll > crate::state::dice::TOTAL_DICE {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_DICE_PER_ROLL".to_string(),
                reason: format!(
                    "Must be between 1 and {}",
                    crate::state::dice::TOTAL_DICE
                ),
            });
        }

        if self.hazards_to_eliminate == 0 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_HAZARDS_TO_ELIMINATE".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.min_players_to_start < 2 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_MIN_PLAYERS".to_string(),
                reason: "Must be at least 2".to_string(),
            });
        }

        if self.max_players < self.min_players_to_start {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_MAX_PLAYERS".to_string(),
                reason: format!(
                    "Must be at least the minimum player count ({})",
                    self.min_players_to_start
                ),
            });
        }

        if self.code_length < 4 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_CODE_LENGTH".to_string(),
                reason: "Must be at least 4".to_string(),
            });
        }

        if self.max_code_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_MAX_CODE_ATTEMPTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.max_name_len == 0 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_MAX_NAME_LEN".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.max_name_suffix < 2 {
            return Err(ConfigError::Invalid {
                var: "BRAINDICE_MAX_NAME_SUFFIX".to_string(),
                reason: "Must be at least 2".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.win_threshold, 13);
        assert_eq!(config.dice_per_roll, 3);
        assert_eq!(config.hazards_to_eliminate, 3);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = GameConfig {
            win_threshold: 0,
            ..GameConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("BRAINDICE_WIN_THRESHOLD"));
    }

    #[test]
    fn test_dice_per_roll_bounds() {
        let config = GameConfig {
            dice_per_roll: 14,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            dice_per_roll: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_player_limits() {
        let config = GameConfig {
            min_players_to_start: 1,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            max_players: 1,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_overlays_defaults() {
        std::env::set_var("BRAINDICE_WIN_THRESHOLD", "21");
        let config = GameConfig::from_env();
        std::env::remove_var("BRAINDICE_WIN_THRESHOLD");

        let config = config.unwrap();
        assert_eq!(config.win_threshold, 21);
        assert_eq!(config.dice_per_roll, 3);
        assert_eq!(config.max_players, 8);
    }

    #[test]
    fn test_parse_env_or_ignores_garbage() {
        std::env::set_var("BRAINDICE_TEST_GARBAGE_VARIABLE", "thirteen");
        let value: u32 = parse_env_or("BRAINDICE_TEST_GARBAGE_VARIABLE", 13);
        std::env::remove_var("BRAINDICE_TEST_GARBAGE_VARIABLE");
        assert_eq!(value, 13);
    }

    #[test]
    fn test_parse_env_or_falls_back() {
        let value: u32 = parse_env_or("BRAINDICE_TEST_UNSET_VARIABLE", 7);
        assert_eq!(value, 7);
    }
}
