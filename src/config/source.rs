// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use super::defaults::DEFAULT_CONFIG_YAML;
use super::error::ConfigError;

/// Abstraction over where config YAML comes from.
///
/// `FileSource` reads from disk; `DefaultSource` yields the embedded config
/// that pulls the upstream URL and key from `BASE_URL` / `OPENAI_API_KEY`;
/// `StringSource` provides content directly (used in tests to avoid file I/O).
pub trait ConfigSource {
    fn load(&self) -> Result<String, ConfigError>;
}

/// Loads config from a file on disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

/// The built-in config, used when no `--config` path is given.
pub struct DefaultSource;

impl ConfigSource for DefaultSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(DEFAULT_CONFIG_YAML.to_string())
    }
}

/// Provides config content directly as a string. Used for testing.
pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }
}
