//! Configuration management for the desk.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::notify::{DEFAULT_PROGRAM_NAME, Platform};
use crate::session::SessionTimeouts;
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration value
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable could not be parsed
    #[error("invalid value for {name}: '{value}'")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },

    /// The warning window does not fit inside the inactivity timeout
    #[error("warning window ({warning_secs}s) must be shorter than the inactivity timeout ({timeout_secs}s)")]
    WarningWindowTooLong {
        /// Configured warning window
        warning_secs: u64,
        /// Configured inactivity timeout
        timeout_secs: u64,
    },
}

/// Desk configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskConfig {
    /// Directory holding the persisted state
    pub data_dir: PathBuf,
    /// Session guard timers
    pub timeouts: SessionTimeouts,
    /// Offset used for report timestamps and "today"
    pub utc_offset: FixedOffset,
    /// Program name prefixed to messages
    pub program_name: String,
    /// `sms:` link flavour
    pub sms_platform: Platform,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./slotdesk-data"),
            timeouts: SessionTimeouts::default(),
            utc_offset: korea_standard_time(),
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            sms_platform: Platform::Android,
        }
    }
}

fn korea_standard_time() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix())
}

impl DeskConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SLOTDESK_DATA_DIR` | `./slotdesk-data` |
    /// | `SLOTDESK_INACTIVITY_TIMEOUT_SECS` | `1800` |
    /// | `SLOTDESK_WARNING_WINDOW_SECS` | `120` |
    /// | `SLOTDESK_UTC_OFFSET_MINUTES` | `540` |
    /// | `SLOTDESK_PROGRAM_NAME` | association program name |
    /// | `SLOTDESK_SMS_PLATFORM` | `android` |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a set variable cannot be parsed or the
    /// timers are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Same as [`DeskConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = lookup("SLOTDESK_DATA_DIR")
            .map_or(defaults.data_dir, PathBuf::from);

        let timeout_secs = parse_or(
            &lookup,
            "SLOTDESK_INACTIVITY_TIMEOUT_SECS",
            defaults.timeouts.inactivity_timeout.as_secs(),
        )?;
        let warning_secs = parse_or(
            &lookup,
            "SLOTDESK_WARNING_WINDOW_SECS",
            defaults.timeouts.warning_window.as_secs(),
        )?;
        if warning_secs >= timeout_secs {
            return Err(ConfigError::WarningWindowTooLong {
                warning_secs,
                timeout_secs,
            });
        }

        let offset_minutes: i32 = parse_or(&lookup, "SLOTDESK_UTC_OFFSET_MINUTES", 540)?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                name: "SLOTDESK_UTC_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
            })?;

        let program_name = lookup("SLOTDESK_PROGRAM_NAME")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.program_name);

        let sms_platform = match lookup("SLOTDESK_SMS_PLATFORM") {
            None => defaults.sms_platform,
            Some(value) => Platform::parse(&value).ok_or(ConfigError::Invalid {
                name: "SLOTDESK_SMS_PLATFORM",
                value,
            })?,
        };

        Ok(Self {
            data_dir,
            timeouts: SessionTimeouts {
                inactivity_timeout: Duration::from_secs(timeout_secs),
                warning_window: Duration::from_secs(warning_secs),
            },
            utc_offset,
            program_name,
            sms_platform,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = DeskConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.timeouts.inactivity_timeout, Duration::from_secs(1800));
        assert_eq!(config.timeouts.warning_window, Duration::from_secs(120));
        assert_eq!(config.utc_offset.local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn overrides_are_applied() {
        let config = DeskConfig::from_lookup(lookup(&[
            ("SLOTDESK_DATA_DIR", "/tmp/desk"),
            ("SLOTDESK_INACTIVITY_TIMEOUT_SECS", "60"),
            ("SLOTDESK_WARNING_WINDOW_SECS", "10"),
            ("SLOTDESK_UTC_OFFSET_MINUTES", "-300"),
            ("SLOTDESK_SMS_PLATFORM", "ios"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/desk"));
        assert_eq!(config.timeouts.until_warning(), Duration::from_secs(50));
        assert_eq!(config.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(config.sms_platform, Platform::Ios);
    }

    #[test]
    fn warning_must_fit_inside_timeout() {
        let err = DeskConfig::from_lookup(lookup(&[
            ("SLOTDESK_INACTIVITY_TIMEOUT_SECS", "60"),
            ("SLOTDESK_WARNING_WINDOW_SECS", "60"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::WarningWindowTooLong { .. }));
    }

    #[test]
    fn garbage_is_reported() {
        let err = DeskConfig::from_lookup(lookup(&[("SLOTDESK_WARNING_WINDOW_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "SLOTDESK_WARNING_WINDOW_SECS",
                value: "soon".to_string()
            }
        );
    }
}
