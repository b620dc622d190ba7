// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! ```yaml
//! checking_seed: "292.12"
//! savings_seed: "914.34"
//! ```

use crate::account::check_precision;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Balances a newly registered user starts with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub checking_seed: Decimal,
    pub savings_seed: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checking_seed: dec!(292.12),
            savings_seed: dec!(914.34),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Seeds must be non-negative whole-cent amounts.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for seed in [self.checking_seed, self.savings_seed] {
            if seed < Decimal::ZERO {
                return Err(ConfigError::Invalid("seed balances cannot be negative".into()));
            }
            check_precision(seed).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registration_seed() {
        let config = EngineConfig::default();
        assert_eq!(config.checking_seed, dec!(292.12));
        assert_eq!(config.savings_seed, dec!(914.34));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("checking_seed: \"10.00\"\n").unwrap();
        assert_eq!(config.checking_seed, dec!(10.00));
        assert_eq!(config.savings_seed, dec!(914.34));
    }

    #[test]
    fn unknown_key_rejected() {
        let result = EngineConfig::from_yaml_str("interest_rate: \"0.05\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn sub_cent_seed_rejected() {
        let result = EngineConfig::from_yaml_str("checking_seed: \"1.005\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn negative_seed_rejected() {
        let result = EngineConfig::from_yaml_str("savings_seed: \"-1\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
