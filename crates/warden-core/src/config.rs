//! Capability configuration.
//!
//! Settings come from environment variables (see [`env_vars`]) or builder
//! methods. Nothing here can stop the fallback path from serving: a bad
//! value is logged and ignored, and a malformed init config only refuses
//! native activation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Default values.
pub mod defaults {
    pub const ENVIRONMENT: &str = "production";
}

/// Environment variable names.
pub mod env_vars {
    /// Environment name passed to native `initialize`
    pub const ENVIRONMENT: &str = "WARDEN_ENV";
    /// Comma-separated enabled feature list
    pub const FEATURES: &str = "WARDEN_FEATURES";

    /// Path of the domain's native library, e.g. `WARDEN_ML_LIBRARY`
    pub fn library(domain: &str) -> String {
        format!("WARDEN_{}_LIBRARY", domain.to_uppercase())
    }

    /// Raw init config override, e.g. `WARDEN_ML_CONFIG`
    pub fn init_config(domain: &str) -> String {
        format!("WARDEN_{}_CONFIG", domain.to_uppercase())
    }

    /// Serialize native calls behind one mutex, e.g. `WARDEN_ML_SERIALIZE`
    pub fn serialize(domain: &str) -> String {
        format!("WARDEN_{}_SERIALIZE", domain.to_uppercase())
    }

    /// Native call timeout in milliseconds, e.g. `WARDEN_ML_TIMEOUT_MS`
    pub fn timeout_ms(domain: &str) -> String {
        format!("WARDEN_{}_TIMEOUT_MS", domain.to_uppercase())
    }
}

/// Configuration handed to the native `initialize` self-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    pub environment: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            environment: defaults::ENVIRONMENT.to_string(),
            features: Vec::new(),
        }
    }
}

/// Settings for one capability domain.
#[derive(Debug, Clone)]
pub struct CapabilitySettings {
    pub domain: String,
    /// Native library to load; `None` disables native acceleration.
    pub library_path: Option<PathBuf>,
    pub init: InitConfig,
    /// Verbatim init config; replaces `init` when set.
    pub raw_init_config: Option<String>,
    /// Guard every native call with one process-wide mutex for this domain.
    pub serialize_native_calls: bool,
    /// Stop waiting for a native call after this long and fall back.
    pub native_timeout: Option<Duration>,
}

impl CapabilitySettings {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            library_path: None,
            init: InitConfig::default(),
            raw_init_config: None,
            serialize_native_calls: false,
            native_timeout: None,
        }
    }

    /// Read settings from the process environment.
    pub fn from_env(domain: &str) -> Self {
        Self::from_lookup(domain, |key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(domain: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::new(domain);

        if let Some(env) = lookup(env_vars::ENVIRONMENT).filter(|v| !v.trim().is_empty()) {
            settings.init.environment = env.trim().to_string();
        }
        if let Some(features) = lookup(env_vars::FEATURES) {
            settings.init.features = parse_feature_list(&features);
        }
        if let Some(path) = lookup(&env_vars::library(domain)).filter(|v| !v.trim().is_empty()) {
            settings.library_path = Some(PathBuf::from(path.trim()));
        }
        settings.raw_init_config = lookup(&env_vars::init_config(domain));

        let serialize_key = env_vars::serialize(domain);
        if let Some(raw) = lookup(&serialize_key) {
            match parse_bool(&raw) {
                Some(flag) => settings.serialize_native_calls = flag,
                None => {
                    tracing::warn!(key = %serialize_key, value = %raw, "Ignoring invalid boolean")
                }
            }
        }

        let timeout_key = env_vars::timeout_ms(domain);
        if let Some(raw) = lookup(&timeout_key) {
            match raw.trim().parse::<u64>() {
                Ok(0) => settings.native_timeout = None,
                Ok(ms) => settings.native_timeout = Some(Duration::from_millis(ms)),
                Err(_) => {
                    tracing::warn!(key = %timeout_key, value = %raw, "Ignoring invalid timeout")
                }
            }
        }

        settings
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.init.environment = environment.into();
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.init.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_raw_init_config(mut self, raw: impl Into<String>) -> Self {
        self.raw_init_config = Some(raw.into());
        self
    }

    pub fn with_serialized_calls(mut self, serialize: bool) -> Self {
        self.serialize_native_calls = serialize;
        self
    }

    pub fn with_native_timeout(mut self, timeout: Duration) -> Self {
        self.native_timeout = Some(timeout);
        self
    }

    /// Serialized config for native `initialize`.
    ///
    /// A raw override must parse as [`InitConfig`]; otherwise the native
    /// path is refused with [`LoadError::InvalidConfig`].
    pub fn init_config_string(&self) -> Result<String, LoadError> {
        match &self.raw_init_config {
            Some(raw) => {
                let parsed: InitConfig = serde_json::from_str(raw)
                    .map_err(|e| LoadError::InvalidConfig(e.to_string()))?;
                if parsed.environment.trim().is_empty() {
                    return Err(LoadError::InvalidConfig("environment must not be empty".into()));
                }
                serde_json::to_string(&parsed).map_err(|e| LoadError::InvalidConfig(e.to_string()))
            }
            None => serde_json::to_string(&self.init)
                .map_err(|e| LoadError::InvalidConfig(e.to_string())),
        }
    }
}

fn parse_feature_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = CapabilitySettings::from_lookup("ml", |_| None);
        assert_eq!(settings.domain, "ml");
        assert!(settings.library_path.is_none());
        assert_eq!(settings.init.environment, "production");
        assert!(!settings.serialize_native_calls);
        assert!(settings.native_timeout.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let settings = CapabilitySettings::from_lookup(
            "cve",
            lookup_from(&[
                ("WARDEN_ENV", "staging"),
                ("WARDEN_FEATURES", "nvd, epss,,kev "),
                ("WARDEN_CVE_LIBRARY", "/opt/warden/libcve.so"),
                ("WARDEN_CVE_SERIALIZE", "yes"),
                ("WARDEN_CVE_TIMEOUT_MS", "250"),
            ]),
        );
        assert_eq!(settings.init.environment, "staging");
        assert_eq!(settings.init.features, vec!["nvd", "epss", "kev"]);
        assert_eq!(settings.library_path, Some(PathBuf::from("/opt/warden/libcve.so")));
        assert!(settings.serialize_native_calls);
        assert_eq!(settings.native_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let settings = CapabilitySettings::from_lookup(
            "ioc",
            lookup_from(&[("WARDEN_IOC_SERIALIZE", "maybe"), ("WARDEN_IOC_TIMEOUT_MS", "soon")]),
        );
        assert!(!settings.serialize_native_calls);
        assert!(settings.native_timeout.is_none());
    }

    #[test]
    fn test_init_config_string() {
        let settings = CapabilitySettings::new("ml")
            .with_environment("dev")
            .with_features(["gpu"]);
        let json = settings.init_config_string().unwrap();
        assert_eq!(json, r#"{"environment":"dev","features":["gpu"]}"#);
    }

    #[test]
    fn test_malformed_raw_config_refuses_native() {
        let settings = CapabilitySettings::new("ml").with_raw_init_config("{environment: dev");
        assert!(matches!(settings.init_config_string(), Err(LoadError::InvalidConfig(_))));

        let settings =
            CapabilitySettings::new("ml").with_raw_init_config(r#"{"environment": " "}"#);
        assert!(matches!(settings.init_config_string(), Err(LoadError::InvalidConfig(_))));

        let settings =
            CapabilitySettings::new("ml").with_raw_init_config(r#"{"environment": "lab"}"#);
        assert_eq!(
            settings.init_config_string().unwrap(),
            r#"{"environment":"lab","features":[]}"#
        );
    }
}
