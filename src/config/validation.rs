//! Configuration validation.
//!
//! Semantic checks on top of serde's syntactic ones. Pure function, returns
//! every violation rather than stopping at the first, and runs before a
//! config is accepted into the system.

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("chain.rpc_url '{0}' is not a valid URL")]
    InvalidRpcUrl(String),

    #[error("chain.chain_id must be nonzero")]
    ZeroChainId,

    #[error("chain.{field} '{value}' is not a valid address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("chain.{0} must be nonzero")]
    ZeroChainTimeout(&'static str),

    #[error("chain.gas_price_multiplier must be at least 1.0")]
    GasMultiplierTooLow,

    #[error("monitor.poll_interval_secs must be nonzero")]
    ZeroPollInterval,

    #[error("unlock.max_attempts must be nonzero")]
    ZeroUnlockAttempts,

    #[error("unlock.retry_interval_ms must be nonzero")]
    ZeroUnlockInterval,
}

/// Validate a configuration, collecting all violations.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::InvalidRpcUrl(config.chain.rpc_url.clone()));
    }
    if config.chain.chain_id == 0 {
        errors.push(ValidationError::ZeroChainId);
    }
    if config.chain.loan_contract.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "loan_contract",
            value: config.chain.loan_contract.clone(),
        });
    }
    if config.chain.token_contract.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "token_contract",
            value: config.chain.token_contract.clone(),
        });
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::ZeroChainTimeout("rpc_timeout_secs"));
    }
    if config.chain.tx_confirmation_timeout_secs == 0 {
        errors.push(ValidationError::ZeroChainTimeout("tx_confirmation_timeout_secs"));
    }
    if config.chain.gas_price_multiplier < 1.0 {
        errors.push(ValidationError::GasMultiplierTooLow);
    }
    if config.monitor.poll_interval_secs == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if config.unlock.max_attempts == 0 {
        errors.push(ValidationError::ZeroUnlockAttempts);
    }
    if config.unlock.retry_interval_ms == 0 {
        errors.push(ValidationError::ZeroUnlockInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AppConfig;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.chain.loan_contract = "0xd880112AeC1307eBE2886e4fB0daec82564f3a65".to_string();
        config.chain.token_contract = "0x637A1259C6afd7E3AdF63993cA7E58BB438aB1B1".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_default_config_missing_contracts() {
        // The default config has no contract addresses and must not validate.
        let errors = validate_config(&AppConfig::default()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidAddress { field: "loan_contract", .. })));
    }

    #[test]
    fn test_all_violations_collected() {
        let mut config = valid_config();
        config.chain.chain_id = 0;
        config.monitor.poll_interval_secs = 0;
        config.unlock.max_attempts = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroChainId));
        assert!(errors.contains(&ValidationError::ZeroPollInterval));
        assert!(errors.contains(&ValidationError::ZeroUnlockAttempts));
    }

    #[test]
    fn test_gas_multiplier_floor() {
        let mut config = valid_config();
        config.chain.gas_price_multiplier = 0.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::GasMultiplierTooLow));
    }
}
