//! Service configuration: an optional `snakeserve.toml` in the working
//! directory, overridable through `SNAKESERVE_`-prefixed environment
//! variables, with defaults matching the original deployment.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Path to the saved state dict, read once at startup.
    #[serde(default = "default_weights_file")]
    pub weights_file: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            weights_file: default_weights_file(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_weights_file() -> String {
    "modelo_serpientes.safetensors".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name("snakeserve").required(false))
        .add_source(config::Environment::with_prefix("SNAKESERVE").separator("__"))
        .build()?
        .try_deserialize()
}
