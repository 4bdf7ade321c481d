// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use super::defaults::{
    DEFAULT_ERROR_MESSAGE, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PERSONA, DEFAULT_TEMPERATURE,
};
use super::error::ConfigError;
use super::interpolation::resolve_variables_with;
use super::raw;
use super::source::ConfigSource;
use super::types::{RelayConfig, UpstreamConfig};

/// Load and validate a relay config from the given source, resolving
/// `${VAR}` references from the process environment.
pub fn load_config(source: &dyn ConfigSource) -> Result<RelayConfig, ConfigError> {
    load_config_with(source, |name| std::env::var(name).ok())
}

/// Load and validate a relay config with an injected variable lookup.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Parse YAML into raw deserialization types
/// 3. Validate the version marker
/// 4. Resolve variable interpolation in string fields
/// 5. Apply defaults and validate required fields and ranges
pub fn load_config_with(
    source: &dyn ConfigSource,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RelayConfig, ConfigError> {
    let raw_yaml = source.load()?;
    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.relay != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.relay
        )));
    }

    let resolve = |value: Option<String>| -> Result<Option<String>, ConfigError> {
        value.map(|v| resolve_variables_with(&v, &lookup)).transpose()
    };

    let upstream = raw.upstream.ok_or_else(|| {
        ConfigError::Validation("missing required section \"upstream\"".to_string())
    })?;

    let base_url = required(resolve(upstream.base_url)?, "upstream.base_url")?;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "upstream.base_url must be an http(s) URL, got \"{base_url}\""
        )));
    }
    let base_url = base_url.trim_end_matches('/').to_string();

    let api_key = required(resolve(upstream.api_key)?, "upstream.api_key")?;

    let model = resolve(upstream.model)?.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "upstream.model must not be empty".to_string(),
        ));
    }

    let max_tokens = upstream.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    if max_tokens == 0 {
        return Err(ConfigError::Validation(
            "upstream.max_tokens must be greater than 0".to_string(),
        ));
    }

    let temperature = upstream.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(format!(
            "upstream.temperature must be within 0.0..=2.0, got {temperature}"
        )));
    }

    let persona = resolve(raw.persona)?.unwrap_or_else(|| DEFAULT_PERSONA.to_string());
    let error_message =
        resolve(raw.error_message)?.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());

    Ok(RelayConfig {
        upstream: UpstreamConfig {
            base_url,
            api_key,
            model,
            max_tokens,
            temperature,
            timeout_ms: upstream.timeout_ms,
        },
        persona,
        error_message,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Validation(format!(
            "missing required field \"{field}\""
        ))),
    }
}
