//! Typed access to environment variables
//!
//! Unset variables fall back to the given default. Variables that are set but
//! do not parse are reported instead of being silently replaced by the default.

use std::str::FromStr;

use crate::error::{ReputileError, Result};

/// Read a string variable, treating empty values as unset
pub fn string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Read a string variable or fall back to `default`
pub fn string_or(key: &str, default: &str) -> String {
    string(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional variable
pub fn parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = string(key) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ReputileError::InvalidEnv {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Parse a variable or fall back to `default` when it is unset
pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse(key)?.unwrap_or(default))
}

/// Read a boolean flag; accepts true/false, 1/0, yes/no, on/off
pub fn flag_or(key: &str, default: bool) -> Result<bool> {
    let Some(raw) = string(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ReputileError::InvalidEnv {
            key: key.to_string(),
            value: raw,
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Read a comma separated list, trimming items and dropping empty ones
pub fn list_or(key: &str, default: &[&str]) -> Vec<String> {
    match string(key) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect(),
        None => default.iter().map(|item| item.to_string()).collect(),
    }
}
