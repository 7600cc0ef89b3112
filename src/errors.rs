use miette::Diagnostic;
use thiserror::Error;

use crate::authz::errors::AuthzError;

#[derive(Debug, Error, Diagnostic)]
pub enum OtterError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(otter::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(otter::config))]
    Config(#[from] config::ConfigError),

    #[error("Bad listen address `{0}`")]
    #[diagnostic(code(otter::bad_addr), help("Set server.host to an IP address"))]
    BadAddr(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Authz(#[from] AuthzError),
}
