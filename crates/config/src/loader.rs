use std::{collections::HashSet, path::Path, str::FromStr};

use anyhow::bail;
use indoc::indoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::Config;

/// Fields that are dropped instead of failing the load when their environment variable is missing.
const OPTIONAL_ENV_FIELDS: &[&str] = &["voice.provider.api_key"];

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let raw_config: Value = toml::from_str(&content)?;

    let config = from_value(raw_config)?;

    for warning in validate(&config)? {
        log::warn!("{warning}");
    }

    Ok(config)
}

pub(crate) fn from_value(mut raw_config: Value) -> anyhow::Result<Config> {
    // An optional field with a missing environment variable is removed and the expansion retried.
    loop {
        let Err(err) = expand_dynamic_strings(&mut Vec::new(), &mut raw_config) else {
            break;
        };

        let Some(path) = extract_path_from_error(&err.to_string()) else {
            return Err(err);
        };

        if !OPTIONAL_ENV_FIELDS.contains(&path.as_str()) || !is_missing_env_var_error(&err) {
            return Err(err);
        }

        if !remove_field_from_config(&mut raw_config, &path) {
            return Err(err);
        }
    }

    Ok(Config::deserialize(raw_config)?)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();

    if config.voice.enabled() && !config.voice.has_provider() {
        warnings.push(
            indoc! {r#"
                Voice endpoints are enabled but no synthesis backend is configured, they will not be exposed.
                Configure one with:

                  [voice.provider]
                  base_url = "https://tts.example.com"
                  api_key = "{{ env.TTS_API_KEY }}"
            "#}
            .trim_end()
            .to_string(),
        );
    }

    if config.voice.max_text_length == 0 {
        bail!("voice.max_text_length must be greater than zero");
    }

    let rate_limits = &config.voice.rate_limits;

    if rate_limits.cleanup_interval.is_zero() {
        bail!("voice.rate_limits.cleanup_interval must be greater than zero");
    }

    let mut seen = HashSet::new();

    for (i, tier) in rate_limits.tiers.iter().enumerate() {
        if tier.window.as_millis() == 0 {
            bail!("Rate limit tier {i} ({}) must have a window of at least 1ms", tier.key);
        }

        if !seen.insert((tier.key, tier.window)) {
            warnings.push(format!(
                "Rate limit tier {i} ({}) repeats the window {:?} of an earlier tier with the same key, both share one counter",
                tier.key, tier.window
            ));
        }
    }

    if rate_limits.enabled && rate_limits.tiers.is_empty() {
        warnings.push("Rate limiting is enabled but no tiers are configured, every request will be admitted".to_string());
    }

    Ok(warnings)
}

/// Check if the error is specifically about a missing environment variable
fn is_missing_env_var_error<E: std::fmt::Display>(err: &E) -> bool {
    let err_str = err.to_string().to_lowercase();

    err_str.contains("environment variable not found")
        || err_str.contains("env var")
        || (err_str.contains("variable") && err_str.contains("not found"))
}

/// Extract the path from an error message like "Failed to expand dynamic string at path 'path': error"
fn extract_path_from_error(error_message: &str) -> Option<String> {
    let start = error_message.find("path '")? + "path '".len();
    let end = error_message[start..].find("':")?;

    Some(error_message[start..start + end].to_string())
}

/// Remove a field from the TOML configuration by its dotted path, returning whether anything was removed.
fn remove_field_from_config(config: &mut Value, path: &str) -> bool {
    let mut parts: Vec<&str> = path.split('.').collect();

    let Some(field) = parts.pop() else {
        return false;
    };

    let mut current = config;

    for part in parts {
        let Some(next) = current.as_table_mut().and_then(|table| table.get_mut(part)) else {
            return false;
        };

        current = next;
    }

    let removed = current
        .as_table_mut()
        .and_then(|table| table.remove(field))
        .is_some();

    if removed {
        log::debug!("Removed optional field '{path}' due to missing environment variable");
    }

    removed
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}
