use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::OtterError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub fixtures: Fixtures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixtures {
    /// Directory of `.kdl` fixture files loaded at startup.
    pub dir: PathBuf,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8181,
        }
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("fixtures"),
        }
    }
}

impl Settings {
    /// Defaults, then the optional file at `path`, then `OTTER__*` env vars.
    pub fn load(path: &str) -> Result<Self, OtterError> {
        Self::load_with_env_prefix(path, "OTTER")
    }

    fn load_with_env_prefix(path: &str, prefix: &str) -> Result<Self, OtterError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)?
            .set_default("server.port", Server::default().port)?
            .set_default(
                "fixtures.dir",
                Fixtures::default().dir.to_string_lossy().to_string(),
            )?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: OTTER__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix(prefix).separator("__"));

        let mut s: Settings = builder.build()?.try_deserialize()?;

        if s.fixtures.dir.is_relative() {
            s.fixtures.dir = std::env::current_dir()?.join(&s.fixtures.dir);
        }

        Ok(s)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
