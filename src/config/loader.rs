// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_API_KEY_ENV, DEFAULT_DECODER_RESET_THRESHOLD, DEFAULT_FUEL_LEVEL,
    DEFAULT_HANDLE_CHUNK, DEFAULT_MAX_TRANSFER_BYTES, DEFAULT_NETWORK_TIMEOUT_SECONDS,
    MAX_FUEL_LEVEL, MIN_FUEL_LEVEL,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the module bridge.
///
/// Every section is optional; missing sections fall back to the built-in
/// defaults in [`crate::config::consts`]. It is typically loaded from a YAML
/// or TOML file.
///
/// # Fields
/// * `module` - Path to the compiled validation module (optional, the CLI requires it)
/// * `api_key_env` - Environment variable read for the `configure` entry point
/// * `fuel` - Fuel budget applied before every entry into the module
/// * `handles` - Handle table growth policy
/// * `strings` - String transfer limits and decoder reset policy
/// * `network` - Fetch capability settings
/// * `globals` - Which global scope accessors the host exposes
///
/// # Example
/// ```yaml
/// module: pkg/validation_semantic_bg.wasm
/// api_key_env: GEMINI_API_KEY
/// fuel:
///   default: 100000000
/// handles:
///   chunk_size: 128
/// network:
///   timeout_seconds: 20
/// globals: [global_this, window]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub fuel: FuelConfig,
    #[serde(default)]
    pub handles: HandleConfig,
    #[serde(default)]
    pub strings: StringConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default = "default_globals")]
    pub globals: Vec<GlobalScopeKind>,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_globals() -> Vec<GlobalScopeKind> {
    vec![GlobalScopeKind::GlobalThis]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module: None,
            api_key_env: default_api_key_env(),
            fuel: FuelConfig::default(),
            handles: HandleConfig::default(),
            strings: StringConfig::default(),
            network: NetworkConfig::default(),
            globals: default_globals(),
        }
    }
}

impl BridgeConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handles.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "handles.chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.strings.max_bytes == 0 || self.strings.max_bytes > i32::MAX as usize {
            return Err(ConfigError::InvalidValue {
                field: "strings.max_bytes",
                reason: format!("must be between 1 and {}", i32::MAX),
            });
        }
        if self.strings.decoder_reset_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "strings.decoder_reset_threshold",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.fuel.get_minimum() > self.fuel.get_maximum() {
            return Err(ConfigError::InvalidValue {
                field: "fuel.minimum",
                reason: format!(
                    "minimum {} exceeds maximum {}",
                    self.fuel.get_minimum(),
                    self.fuel.get_maximum()
                ),
            });
        }
        if self.network.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Fuel granted before each entry point call or event-loop turn.
    pub fn fuel_per_call(&self) -> u64 {
        self.fuel.validate_and_clamp(self.fuel.get_default())
    }
}

/// Fuel consumption configuration for module execution.
///
/// Fuel limits prevent runaway loops inside the module by limiting the number
/// of instructions it can execute per entry. Values are validated against the
/// security bounds.
///
/// # Fields
/// * `default` - Fuel granted per entry (defaults to 100M)
/// * `minimum` - Minimum allowed fuel level (defaults to 1M)
/// * `maximum` - Maximum allowed fuel level (defaults to 500M) - security limit
///
/// # Example
/// ```yaml
/// fuel:
///   default: 100000000   # 100 million instructions
///   minimum: 1000000     # 1 million instructions
///   maximum: 500000000   # 500 million instructions (hard limit)
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuelConfig {
    pub default: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    /// Get the default fuel level, using built-in default if not configured.
    pub fn get_default(&self) -> u64 {
        self.default.unwrap_or(DEFAULT_FUEL_LEVEL)
    }

    /// Get the minimum fuel level, using built-in default if not configured.
    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    /// Get the maximum fuel level, using built-in default if not configured.
    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Validate and clamp a fuel level to configured bounds.
    ///
    /// # Example
    /// ```
    /// use validation_bridge::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// let fuel = config.validate_and_clamp(1_000_000_000); // Too high
    /// assert_eq!(fuel, 500_000_000); // Clamped to maximum
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum();
        if requested < min || requested > max {
            tracing::warn!(requested, min, max, "Fuel level out of bounds, clamping");
        }
        requested.clamp(min, max)
    }
}

/// Handle table growth policy.
#[derive(Debug, Clone, Deserialize)]
pub struct HandleConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
}

fn default_chunk_size() -> u32 {
    DEFAULT_HANDLE_CHUNK
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_HANDLE_CHUNK,
        }
    }
}

/// String transfer limits.
///
/// `decoder_reset_threshold` bounds the cumulative number of bytes one decoder
/// instance handles before it is torn down and recreated.
#[derive(Debug, Clone, Deserialize)]
pub struct StringConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_decoder_reset_threshold")]
    pub decoder_reset_threshold: u64,
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_TRANSFER_BYTES
}

fn default_decoder_reset_threshold() -> u64 {
    DEFAULT_DECODER_RESET_THRESHOLD
}

impl Default for StringConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_TRANSFER_BYTES,
            decoder_reset_threshold: DEFAULT_DECODER_RESET_THRESHOLD,
        }
    }
}

/// Settings for the network capability behind the fetch adapters.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECONDS
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_NETWORK_TIMEOUT_SECONDS,
            user_agent: None,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Global scope accessors the module may probe for.
///
/// Accessors not listed here report absence (handle 0) to the module.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GlobalScopeKind {
    Global,
    GlobalThis,
    #[serde(rename = "self")]
    SelfScope,
    Window,
}

impl GlobalScopeKind {
    /// Class name reported by debug rendering.
    pub fn class_name(self) -> &'static str {
        match self {
            GlobalScopeKind::Global => "global",
            GlobalScopeKind::GlobalThis => "global",
            GlobalScopeKind::SelfScope => "DedicatedWorkerGlobalScope",
            GlobalScopeKind::Window => "Window",
        }
    }
}

/// Load and validate a config from a YAML or TOML file, chosen by extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BridgeConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: display.clone(),
        message: e.to_string(),
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let cfg: BridgeConfig = match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: display.clone(),
                message: e.to_string(),
            })?
        }
        Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: display.clone(),
            message: e.to_string(),
        })?,
        _ => return Err(ConfigError::UnsupportedFormat { path: display }),
    };

    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_yaml_config() {
        let yaml = r#"
module: pkg/validation_semantic_bg.wasm
api_key_env: GEMINI_API_KEY
handles:
  chunk_size: 64
globals: [global_this, window]
"#;

        let cfg: BridgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.module.as_deref(), Some("pkg/validation_semantic_bg.wasm"));
        assert_eq!(cfg.api_key_env, "GEMINI_API_KEY");
        assert_eq!(cfg.handles.chunk_size, 64);
        assert_eq!(
            cfg.globals,
            vec![GlobalScopeKind::GlobalThis, GlobalScopeKind::Window]
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let cfg: BridgeConfig = serde_yaml::from_str("module: m.wasm").unwrap();

        assert_eq!(cfg.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(cfg.handles.chunk_size, DEFAULT_HANDLE_CHUNK);
        assert_eq!(cfg.strings.max_bytes, DEFAULT_MAX_TRANSFER_BYTES);
        assert_eq!(
            cfg.strings.decoder_reset_threshold,
            DEFAULT_DECODER_RESET_THRESHOLD
        );
        assert_eq!(cfg.network.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.globals, vec![GlobalScopeKind::GlobalThis]);
        assert_eq!(cfg.fuel_per_call(), 100_000_000);
    }

    #[test]
    fn test_self_scope_rename() {
        let cfg: BridgeConfig = serde_yaml::from_str("globals: [self, global]").unwrap();
        assert_eq!(
            cfg.globals,
            vec![GlobalScopeKind::SelfScope, GlobalScopeKind::Global]
        );
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_temp(".yaml", "module: a.wasm\nnetwork:\n  timeout_seconds: 5\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.network.timeout_seconds, 5);
    }

    #[test]
    fn test_shipped_config_loads() {
        let cfg = load_config("configs/bridge.yaml").unwrap();
        assert_eq!(cfg.api_key_env, "GEMINI_API_KEY");
        assert!(cfg.globals.contains(&GlobalScopeKind::Window));
    }

    #[test]
    fn test_load_toml_file() {
        let toml = r#"
module = "a.wasm"
globals = ["window"]

[strings]
max_bytes = 1024
"#;
        let file = write_temp(".toml", toml);
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.strings.max_bytes, 1024);
        assert_eq!(cfg.globals, vec![GlobalScopeKind::Window]);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".json", "{}");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/bridge.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let file = write_temp(".yaml", "handles:\n  chunk_size: 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                field: "handles.chunk_size",
                reason: "must be greater than zero".to_string(),
            }
        );
    }

    #[test]
    fn test_inverted_fuel_bounds_rejected() {
        let cfg: BridgeConfig =
            serde_yaml::from_str("fuel:\n  minimum: 10\n  maximum: 5\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_fuel_config_validate_and_clamp() {
        let config = FuelConfig {
            default: Some(100_000_000),
            minimum: Some(10_000_000),
            maximum: Some(200_000_000),
        };

        assert_eq!(config.validate_and_clamp(50_000_000), 50_000_000);
        assert_eq!(config.validate_and_clamp(1_000_000), 10_000_000);
        assert_eq!(config.validate_and_clamp(1_000_000_000), 200_000_000);
        assert_eq!(config.validate_and_clamp(10_000_000), 10_000_000);
        assert_eq!(config.validate_and_clamp(200_000_000), 200_000_000);
    }

    #[test]
    fn test_fuel_per_call_is_clamped() {
        let cfg: BridgeConfig =
            serde_yaml::from_str("fuel:\n  default: 900000000\n").unwrap();
        assert_eq!(cfg.fuel_per_call(), MAX_FUEL_LEVEL);
    }
}
