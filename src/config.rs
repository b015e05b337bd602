//! Capture configuration.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Environment variables** — values from `CARRYOVER_*` env vars, applied
//!    by [`BridgeConfig::from_env`] or [`BridgeConfig::apply_env_overrides`].
//!    A variable that is set overwrites whatever the config already holds,
//!    including builder values.
//! 2. **Programmatic** — values set via builder methods (`clear_missing(true)`)
//! 3. **Defaults** — [`BridgeConfig::default()`]
//!
//! To make builder values win, apply the environment first and call the
//! builder methods afterwards:
//!
//! ```
//! use carryover::config::BridgeConfig;
//!
//! let config = BridgeConfig::from_env().unwrap().clear_missing(true);
//! assert!(config.clear_missing);
//! ```
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `CARRYOVER_CAPTURE_POLICY` | `carrier-first` \| `thread-local-only` | `capture_policy` |
//! | `CARRYOVER_CLEAR_MISSING` | `bool` | `clear_missing` |

use crate::error::{ContextError, Result};
use std::env::VarError;
use std::str::FromStr;

/// Environment variable name for the capture policy.
pub const ENV_CAPTURE_POLICY: &str = "CARRYOVER_CAPTURE_POLICY";
/// Environment variable name for the clear-missing toggle.
pub const ENV_CLEAR_MISSING: &str = "CARRYOVER_CLEAR_MISSING";

/// Where a snapshot reads its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePolicy {
    /// Read from the carrier when a non-empty one is supplied, otherwise from
    /// the current thread.
    #[default]
    CarrierFirst,
    /// Always read from the current thread; carriers are ignored.
    ThreadLocalOnly,
}

impl FromStr for CapturePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carrier-first" | "carrier_first" => Ok(Self::CarrierFirst),
            "thread-local-only" | "thread_local_only" => Ok(Self::ThreadLocalOnly),
            _ => Err("expected `carrier-first` or `thread-local-only`".to_string()),
        }
    }
}

/// Options applied when a bridge captures its snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Carrier versus thread-local precedence.
    pub capture_policy: CapturePolicy,
    /// When capturing from a carrier, record registered keys the carrier
    /// lacks as absent, so installing the snapshot clears them.
    pub clear_missing: bool,
}

impl BridgeConfig {
    /// Defaults: carrier first, missing keys left untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capture policy.
    #[must_use]
    pub fn capture_policy(mut self, policy: CapturePolicy) -> Self {
        self.capture_policy = policy;
        self
    }

    /// Set whether keys missing from a carrier are cleared on install.
    #[must_use]
    pub fn clear_missing(mut self, clear: bool) -> Self {
        self.clear_missing = clear;
        self
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `CARRYOVER_*` environment overrides.
    ///
    /// Only variables that are set are applied, and they overwrite the
    /// current values. Returns an error if a variable is set but is not
    /// valid unicode or cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| env_var(name, std::env::var(name)))
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&'static str) -> Result<Option<String>>,
    ) -> Result<()> {
        if let Some(val) = lookup(ENV_CAPTURE_POLICY)? {
            self.capture_policy = val.parse().map_err(|reason| ContextError::Config {
                var: ENV_CAPTURE_POLICY,
                value: val.clone(),
                reason,
            })?;
        }
        if let Some(val) = lookup(ENV_CLEAR_MISSING)? {
            self.clear_missing = parse_bool(ENV_CLEAR_MISSING, &val)?;
        }
        Ok(())
    }
}

fn env_var(
    var: &'static str,
    value: std::result::Result<String, VarError>,
) -> Result<Option<String>> {
    match value {
        Ok(val) => Ok(Some(val)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(ContextError::Config {
            var,
            value: raw.to_string_lossy().into_owned(),
            reason: "not valid unicode".to_string(),
        }),
    }
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ContextError::Config {
            var,
            value: val.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&'static str) -> Result<Option<String>> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| Ok(map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = BridgeConfig::new();
        assert_eq!(config.capture_policy, CapturePolicy::CarrierFirst);
        assert!(!config.clear_missing);
    }

    #[test]
    fn builder_setters() {
        let config = BridgeConfig::new()
            .capture_policy(CapturePolicy::ThreadLocalOnly)
            .clear_missing(true);
        assert_eq!(config.capture_policy, CapturePolicy::ThreadLocalOnly);
        assert!(config.clear_missing);
    }

    #[test]
    fn overrides_apply() {
        let mut config = BridgeConfig::new();
        config
            .apply_overrides(overrides(&[
                (ENV_CAPTURE_POLICY, " Thread-Local-Only "),
                (ENV_CLEAR_MISSING, "1"),
            ]))
            .unwrap();
        assert_eq!(config.capture_policy, CapturePolicy::ThreadLocalOnly);
        assert!(config.clear_missing);
    }

    #[test]
    fn unset_variables_keep_values() {
        let mut config = BridgeConfig::new().clear_missing(true);
        config.apply_overrides(overrides(&[])).unwrap();
        assert!(config.clear_missing);
    }

    #[test]
    fn bad_values_are_reported() {
        let mut config = BridgeConfig::new();
        let err = config
            .apply_overrides(overrides(&[(ENV_CLEAR_MISSING, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ContextError::Config { var, .. } if var == ENV_CLEAR_MISSING));

        let err = config
            .apply_overrides(overrides(&[(ENV_CAPTURE_POLICY, "sideways")]))
            .unwrap_err();
        assert!(matches!(err, ContextError::Config { var, .. } if var == ENV_CAPTURE_POLICY));
    }

    #[test]
    fn env_overrides_replace_builder_values() {
        let mut config = BridgeConfig::new()
            .capture_policy(CapturePolicy::ThreadLocalOnly)
            .clear_missing(true);
        config
            .apply_overrides(overrides(&[
                (ENV_CAPTURE_POLICY, "carrier-first"),
                (ENV_CLEAR_MISSING, "0"),
            ]))
            .unwrap();
        assert_eq!(config.capture_policy, CapturePolicy::CarrierFirst);
        assert!(!config.clear_missing);

        let mut config = BridgeConfig::new();
        config
            .apply_overrides(overrides(&[(ENV_CLEAR_MISSING, "0")]))
            .unwrap();
        let config = config.clear_missing(true);
        assert!(config.clear_missing);
    }

    #[test]
    fn non_unicode_values_are_reported() {
        assert_eq!(env_var(ENV_CLEAR_MISSING, Err(VarError::NotPresent)).unwrap(), None);
        assert_eq!(
            env_var(ENV_CLEAR_MISSING, Ok("on".to_string())).unwrap().as_deref(),
            Some("on")
        );

        let raw = std::ffi::OsString::from("yes");
        let err = env_var(ENV_CLEAR_MISSING, Err(VarError::NotUnicode(raw))).unwrap_err();
        assert!(matches!(
            err,
            ContextError::Config { var, ref reason, .. }
                if var == ENV_CLEAR_MISSING && reason == "not valid unicode"
        ));

        let mut config = BridgeConfig::new().clear_missing(true);
        let err = config
            .apply_overrides(|name| {
                env_var(name, Err(VarError::NotUnicode(std::ffi::OsString::from("x"))))
            })
            .unwrap_err();
        assert!(matches!(err, ContextError::Config { var, .. } if var == ENV_CAPTURE_POLICY));
        assert!(config.clear_missing);
    }
}
