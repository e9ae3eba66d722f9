use std::net::AddrParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid server address {addr}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("Unknown agent in HERALD_AGENTS: {0}")]
    UnknownAgent(String),

    #[error("HERALD_AGENTS names no agents to host")]
    NoAgents,

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Name of the environment variable that sets a settings field
pub fn to_env_var(field: &str) -> String {
    let path = match field {
        "provider" | "type" => "provider.type",
        "api_key" => "provider.api_key",
        other => other,
    };
    format!(
        "HERALD_{}",
        path.split('.')
            .map(|part| part.to_uppercase())
            .collect::<Vec<_>>()
            .join("__")
    )
}
