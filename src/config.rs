//! Agent configuration.
//!
//! Configuration lives in an explicit [`Config`] value map constructed in
//! `main` and passed into each subsystem; there is no global singleton and
//! tests build their own per-case instances.
//!
//! The on-disk format is a minimal flat `key: value` file. Lines starting
//! with `#` and blank lines are skipped. Values are typed by shape:
//! `true/false/yes/no/on/off` become booleans, bare integer literals become
//! integers, `d.d` literals become floats, and everything else is kept as a
//! string with surrounding quotes stripped.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fs;

// ── Values ───────────────────────────────────────────────────────────────────

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    /// Types a raw value string by its shape.
    fn from_raw(raw: &str) -> ConfigValue {
        match raw {
            "true" | "yes" | "on" => return ConfigValue::Bool(true),
            "false" | "no" | "off" => return ConfigValue::Bool(false),
            _ => {}
        }

        if is_integer_literal(raw) {
            if let Ok(v) = raw.parse::<i64>() {
                return ConfigValue::Int(v);
            }
        }

        if is_decimal_literal(raw) {
            if let Ok(v) = raw.parse::<f64>() {
                return ConfigValue::Float(v);
            }
        }

        ConfigValue::Str(strip_quotes(raw).to_string())
    }
}

/// `-?\d+`
fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `-?\d+\.\d+`
fn is_decimal_literal(raw: &str) -> bool {
    let body = raw.strip_prefix('-').unwrap_or(raw);
    match body.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Removes a single pair of matching surrounding quotes, if present.
fn strip_quotes(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

// ── Config map ───────────────────────────────────────────────────────────────

/// Typed key/value configuration with built-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
    values: HashMap<String, ConfigValue>,
}

impl Default for Config {
    fn default() -> Self {
        let mut cfg = Config { values: HashMap::new() };

        cfg.set("enable_api", ConfigValue::Bool(false));
        cfg.set("api_port", ConfigValue::Int(8080));

        cfg.set("enable_web", ConfigValue::Bool(false));
        cfg.set("web_port", ConfigValue::Int(9090));

        cfg.set("enable_packet_capture", ConfigValue::Bool(false));
        cfg.set("capture_interface", ConfigValue::Str("eth0".to_string()));

        cfg.set("log_level", ConfigValue::Str("info".to_string()));
        cfg.set("log_file", ConfigValue::Str("netsentry.log".to_string()));

        cfg.set("metric_retention_seconds", ConfigValue::Int(3600));
        cfg.set("alert_cooldown_seconds", ConfigValue::Int(60));

        cfg.set("cpu_threshold_warning", ConfigValue::Int(80));
        cfg.set("cpu_threshold_critical", ConfigValue::Int(90));

        cfg.set("memory_threshold_warning", ConfigValue::Int(75));
        cfg.set("memory_threshold_critical", ConfigValue::Int(85));

        cfg
    }
}

impl Config {
    /// Builds the default config and overlays values from `path`.
    pub fn load_from_file(path: &str) -> Result<Config, ConfigError> {
        let mut cfg = Config::default();
        cfg.apply_file(path)?;
        Ok(cfg)
    }

    /// Overlays `key: value` pairs from a file onto this config.
    ///
    /// Unparseable lines are skipped rather than treated as fatal; a
    /// missing or unreadable file is an error the caller reports once at
    /// startup before continuing on defaults.
    pub fn apply_file(&mut self, path: &str) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Split on the first colon only; values may contain colons.
            if let Some((key, raw)) = line.split_once(':') {
                let key = key.trim();
                let raw = raw.trim();
                if !key.is_empty() && !raw.is_empty() {
                    self.set(key, ConfigValue::from_raw(raw));
                }
            }
        }

        Ok(())
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    // ── Typed getters ────────────────────────────────────────────────────────
    // A wrong-typed value behaves like an absent one and yields the default.

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ConfigValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn get_u16(&self, key: &str, default: u16) -> u16 {
        match self.values.get(key) {
            Some(ConfigValue::Int(v)) => u16::try_from(*v).unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        match self.values.get(key) {
            Some(ConfigValue::Int(v)) => u32::try_from(*v).unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(ConfigValue::Float(v)) => *v,
            Some(ConfigValue::Int(v)) => *v as f64,
            _ => default,
        }
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(ConfigValue::Str(v)) => v.clone(),
            _ => default.to_string(),
        }
    }
}
