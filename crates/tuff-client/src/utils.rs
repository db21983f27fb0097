//! Environment variable parsing for client configuration.

use std::env;
use std::str::FromStr;

/// Error type for environment variable parsing.
pub type EnvError = Box<dyn std::error::Error + Send + Sync>;

/// Read a variable, `None` if unset.
fn env_raw(name: &str) -> Result<Option<String>, EnvError> {
    match env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}").into()),
    }
}

/// Parse an environment variable as a boolean, with a default value.
///
/// Valid values (case-insensitive): "true", "1", "false", "0".
/// Returns an error for any other value to prevent misconfiguration.
///
/// # Errors
///
/// Returns an error if the environment variable is set to an invalid value,
/// or if the value contains invalid Unicode.
pub fn env_bool(name: &str, default: bool) -> Result<bool, EnvError> {
    let Some(value) = env_raw(name)? else {
        return Ok(default);
    };

    match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!(
            "{name}: invalid value '{value}' (expected 'true', 'false', '1', or '0')"
        )
        .into()),
    }
}

/// Parse an environment variable as a u32, with a default value.
///
/// # Errors
///
/// Returns an error if the environment variable is set to an invalid value,
/// or if the value contains invalid Unicode.
pub fn env_u32(name: &str, default: u32) -> Result<u32, EnvError> {
    Ok(env_parse(name)?.unwrap_or(default))
}

/// Read an environment variable as a string, with a default value.
///
/// An empty value counts as unset.
///
/// # Errors
///
/// Returns an error if the value contains invalid Unicode.
pub fn env_string(name: &str, default: &str) -> Result<String, EnvError> {
    Ok(env_raw(name)?
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string()))
}

/// Parse an optional environment variable.
///
/// # Errors
///
/// Returns an error if the variable is set but does not parse, or if the
/// value contains invalid Unicode.
pub fn env_parse<T>(name: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_raw(name)?
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| format!("{name}: invalid value '{value}': {e}").into())
        })
        .transpose()
}
