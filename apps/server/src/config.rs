//! Server configuration from environment variables.

use market_gen::{GenConfig, GenMode};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub gen: GenConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            gen: GenConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `RUNIC_HOST`, `RUNIC_PORT` and `RUNIC_GEN_MODE` (`full`|`delta`),
    /// falling back to defaults on anything missing or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("RUNIC_HOST").unwrap_or(defaults.host);
        let port = std::env::var("RUNIC_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);
        let mut gen = defaults.gen;
        if let Some(mode) = std::env::var("RUNIC_GEN_MODE")
            .ok()
            .and_then(|s| s.parse::<GenMode>().ok())
        {
            gen.mode = mode;
        }
        Self { host, port, gen }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
