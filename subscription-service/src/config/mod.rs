//! Configuration module for subscription-service.

use crate::models::MAX_EXTERNAL_KEY_LENGTH;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub bundles: BundleConfig,
    pub identity_cache: IdentityCacheConfig,
}

#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Never above [`MAX_EXTERNAL_KEY_LENGTH`].
    pub max_external_key_length: usize,
}

#[derive(Debug, Clone)]
pub struct IdentityCacheConfig {
    pub enabled: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "subscription-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            bundles: BundleConfig {
                max_external_key_length: MAX_EXTERNAL_KEY_LENGTH,
            },
            identity_cache: IdentityCacheConfig { enabled: true },
        }
    }
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let max_external_key_length = match env::var("BUNDLE_MAX_EXTERNAL_KEY_LENGTH") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!(
                    "BUNDLE_MAX_EXTERNAL_KEY_LENGTH must be a positive integer, got {raw}"
                ))
            })?,
            Err(_) => MAX_EXTERNAL_KEY_LENGTH,
        };
        if max_external_key_length == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BUNDLE_MAX_EXTERNAL_KEY_LENGTH must be greater than zero"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "subscription-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            bundles: BundleConfig {
                max_external_key_length: max_external_key_length.min(MAX_EXTERNAL_KEY_LENGTH),
            },
            identity_cache: IdentityCacheConfig {
                enabled: env::var("IDENTITY_CACHE_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_caps_external_key_length() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.bundles.max_external_key_length, 255);
        assert!(config.identity_cache.enabled);
        assert_eq!(config.service_name, "subscription-service");
    }
}
