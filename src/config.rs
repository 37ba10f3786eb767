use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::tournaments::rounds::draws::drawalgs::{
    DrawMethod, DrawOptions, clash::DEFAULT_CLASH_PENALTY,
};

/// Application configuration. Read from a TOML file, with `DATABASE_URL`
/// taking precedence over the file when it is set.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database_url: String,
    pub pool_size: Option<u32>,
    /// Upper bound on how long a single store operation may take before the
    /// caller is told that it failed.
    pub store_timeout_secs: Option<u64>,
    pub draw: DrawDefaults,
    /// A `tracing-subscriber` filter directive, e.g. `info` or
    /// `tabdraw=debug`.
    pub log: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DrawDefaults {
    pub method: DrawMethod,
    pub avoid_institution_clashes: bool,
    pub balance_experience: bool,
    pub clash_penalty: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: ":memory:".to_string(),
            pool_size: None,
            store_timeout_secs: None,
            draw: DrawDefaults::default(),
            log: "info".to_string(),
        }
    }
}

impl Default for DrawDefaults {
    fn default() -> Self {
        Self {
            method: DrawMethod::Random,
            avoid_institution_clashes: true,
            balance_experience: false,
            clash_penalty: DEFAULT_CLASH_PENALTY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Loads the configuration from `path` (or the defaults, if no path is
    /// given) and then applies overrides from the environment.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::Io {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Config::from_toml(&text)?
            }
            None => Config::default(),
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn with_env_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Config {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        self
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_secs.map(Duration::from_secs)
    }

    /// The draw options used when a caller does not override them.
    pub fn draw_options(&self) -> DrawOptions {
        DrawOptions {
            method: self.draw.method,
            avoid_institution_clashes: self.draw.avoid_institution_clashes,
            balance_experience: self.draw.balance_experience,
            strengths: None,
            clash_penalty: self.draw.clash_penalty,
        }
    }
}
