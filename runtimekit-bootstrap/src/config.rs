//! Configuration management

use serde::Deserialize;
use std::path::Path;

/// Settings that do not come from the Lambda environment
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub process: ProcessConfig,
}

/// How the handler program is launched
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProcessConfig {
    /// Program used to run the handler, e.g. `sh`; the handler path is its
    /// first argument. When unset the handler is executed directly.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Extra arguments appended after the handler path
    #[serde(default)]
    pub args: Vec<String>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Without an explicit path, `runtimekit.{toml,json,yaml}` in the
    /// working directory is used if present. `RUNTIMEKIT_PROCESS__INTERPRETER`
    /// style variables override the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("runtimekit").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("RUNTIMEKIT").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }
}
