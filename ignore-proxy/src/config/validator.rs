//! Configuration validation

use super::schema::Config;
use crate::error::{Result, ValidationError};
use ipnet::IpNet;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate entire configuration
    pub fn validate(config: &Config) -> Result<()> {
        Self::validate_patterns(&config.proxy.ignore_hosts)?;
        if config.proxy.socket.as_os_str().is_empty() {
            return Err(ValidationError::EmptySocketPath.into());
        }
        Ok(())
    }

    /// Validate operator-supplied ignore patterns
    pub fn validate_patterns(patterns: &[String]) -> Result<()> {
        for pattern in patterns {
            Self::validate_pattern(pattern)?;
        }
        Ok(())
    }

    fn validate_pattern(pattern: &str) -> Result<()> {
        // Basic validation: no double wildcards, no empty entries
        if pattern.trim().is_empty() || pattern.contains("**") {
            return Err(ValidationError::InvalidPattern {
                pattern: pattern.to_string(),
            }
            .into());
        }

        // Check for invalid characters
        if pattern.contains('\0') || pattern.contains('\n') {
            return Err(ValidationError::InvalidPattern {
                pattern: pattern.escape_debug().to_string(),
            }
            .into());
        }

        // Anything with a prefix length must be a valid CIDR range
        if pattern.contains('/') && pattern.trim().parse::<IpNet>().is_err() {
            return Err(ValidationError::InvalidCidr {
                cidr: pattern.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_patterns() {
        let list = patterns(&["example.com", "*.cdn.example.net", "10.0.0.0/8", "fd00::/8", "192.168.1.7"]);
        assert!(ConfigValidator::validate_patterns(&list).is_ok());
    }

    #[test]
    fn test_double_wildcard_rejected() {
        let result = ConfigValidator::validate_patterns(&patterns(&["**.example.com"]));
        assert!(matches!(
            result,
            Err(ProxyError::Validation(ValidationError::InvalidPattern { .. }))
        ));
    }

    #[test]
    fn test_bad_cidr_rejected() {
        let result = ConfigValidator::validate_patterns(&patterns(&["10.0.0.0/40"]));
        assert!(matches!(
            result,
            Err(ProxyError::Validation(ValidationError::InvalidCidr { .. }))
        ));
    }

    #[test]
    fn test_empty_socket_rejected() {
        let mut config = Config::default();
        config.proxy.socket = Default::default();
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ProxyError::Validation(ValidationError::EmptySocketPath))
        ));
    }
}
