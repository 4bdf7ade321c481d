// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads the relay YAML (from disk or the embedded default), resolves
// `${VAR}` interpolation from the environment, applies defaults and
// validates required fields into an explicit `RelayConfig`.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::{
    DEFAULT_CONFIG_YAML, DEFAULT_ERROR_MESSAGE, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_PERSONA, DEFAULT_TEMPERATURE,
};
pub use error::ConfigError;
pub use interpolation::resolve_variables_with;
pub use loader::{load_config, load_config_with};
pub use source::{ConfigSource, DefaultSource, FileSource, StringSource};
pub use types::{RelayConfig, UpstreamConfig};
