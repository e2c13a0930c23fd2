use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info, LevelFilter};
use toml::Value;

use crate::dispatch::DispatcherConfig;
use crate::logging::{parse_log_level, LogConfig, LogDestination, LogFormat};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "DISPATCHCORE_CONFIG";

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config: config.config,
            config_file_path: Some(path),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(Self::from_config(parse_toml_config(content)?))
    }

    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }

    /// Get value from configuration, falling back to the `base` section
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        self.config
            .get(section)
            .and_then(|s| s.get(key))
            .or_else(|| self.config.get("base").and_then(|s| s.get(key)))
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    /// Get unsigned integer value with type conversion
    pub fn get_u64(&self, section: &str, key: &str) -> Result<Option<u64>> {
        self.get_value(section, key)
            .map(|value| {
                value
                    .parse::<u64>()
                    .with_context(|| format!("Invalid integer value for {}.{}: {}", section, key, value))
            })
            .transpose()
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Dispatcher settings from the `[dispatcher]` section
    pub fn get_dispatcher_config(&self) -> Result<DispatcherConfig> {
        let mut config = DispatcherConfig::default();

        if let Some(timeout_ms) = self.get_u64("dispatcher", "reaction-timeout-ms")? {
            config.reaction_timeout_ms = Some(timeout_ms);
        }

        if let Some(limit) = self.get_u64("dispatcher", "max-subscriptions")? {
            let limit = usize::try_from(limit)
                .with_context(|| format!("max-subscriptions out of range: {}", limit))?;
            config.max_subscriptions_per_channel = Some(limit);
        }

        if let Some(log_failures) = self.get_bool("dispatcher", "log-failures")? {
            config.log_failures = log_failures;
        }

        config
            .validate()
            .context("Dispatcher configuration validation failed")?;

        Ok(config)
    }

    /// Logger settings from the `[logging]` section (or `[base]`)
    pub fn get_log_config(&self) -> Result<LogConfig> {
        let mut config = LogConfig::default();

        if let Some(level) = self.get_log_level("logging", "log-level")? {
            config.console_level = level;
        }

        if let Some(format) = self.get_value("logging", "log-format") {
            config.format = format.parse::<LogFormat>().map_err(anyhow::Error::msg)?;
        }

        if let Some(path) = self.get_path("logging", "log-file") {
            config.file_level = Some(
                self.get_log_level("logging", "log-file-level")?
                    .unwrap_or(config.console_level),
            );
            config.destination = LogDestination::Both(path);
        }

        Ok(config)
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("dispatchcore").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".dispatchcore.toml"));
    }

    paths.push(PathBuf::from("./.dispatchcore.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse().context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    Ok(config)
}

/// Recursively flatten TOML tables into section.subsection format
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) if subtable.values().all(|v| !v.is_table()) => {
                let section_map = subtable
                    .iter()
                    .map(|(subkey, subvalue)| (subkey.clone(), toml_value_to_string(subvalue)))
                    .collect();
                config.insert(section_name, section_map);
            }
            Value::Table(subtable) => flatten_toml_table(subtable, section_name, config),
            _ => {
                // Top-level keys land in `base`
                let section = if prefix.is_empty() { "base".to_string() } else { prefix.clone() };
                config
                    .entry(section)
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}
