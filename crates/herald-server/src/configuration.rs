use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File};
use herald::agent::DEFAULT_MAX_TURNS;
use herald::providers::{
    configs::{OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig},
    factory::ProviderType,
    ollama, openai,
};
use herald::systems::search::{SearchConfig, SEARCH_HOST, SEARCH_MAX_RESULTS};
use herald::units::{content::CONTENT_AGENT, research::RESEARCH_AGENT, UnitConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|source| ConfigError::InvalidAddress { addr, source })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Ollama {
        #[serde(default = "default_ollama_host")]
        host: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Ollama { .. } => ProviderType::Ollama,
        }
    }

    pub fn to_config(&self) -> ProviderConfig {
        match self.clone() {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Ollama {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchSettings {
    /// Without a key the research agent runs without web search
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_host")]
    pub host: String,
    #[serde(default = "default_search_max_results")]
    pub max_results: u32,
}

impl SearchSettings {
    pub fn to_config(&self) -> Option<SearchConfig> {
        let api_key = self.api_key.as_ref().filter(|key| !key.is_empty())?;
        Some(SearchConfig {
            api_key: api_key.clone(),
            host: self.host.clone(),
            max_results: self.max_results,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UnitSettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Deadline for runs whose request carries none
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default = "default_agents")]
    pub agents: Vec<String>,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub search: Option<SearchSettings>,
    #[serde(default)]
    pub unit: UnitSettings,
}

/// Optional settings file read from the working directory; environment variables win over it
pub const CONFIG_FILE: &str = "herald.toml";

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate(Path::new(CONFIG_FILE))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_and_validate(path.as_ref())
    }

    pub fn unit_config(&self) -> UnitConfig {
        UnitConfig::new(self.provider.to_config())
            .with_search(self.search.as_ref().and_then(SearchSettings::to_config))
            .with_max_turns(self.unit.max_turns)
    }

    pub fn default_deadline(&self) -> Option<Duration> {
        self.unit.deadline_secs.map(Duration::from_secs)
    }

    fn load_and_validate(config_file: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(File::from(config_file).required(false))
            .add_source(
                Environment::with_prefix("HERALD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("agents"),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                if let Some(field) = missing_field(&err.to_string()) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

/// Extract the field name from a "missing field `name`" message
fn missing_field(message: &str) -> Option<String> {
    let rest = message.split_once("missing field `")?.1;
    let (field, _) = rest.split_once('`')?;
    Some(field.to_string())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_agents() -> Vec<String> {
    vec![RESEARCH_AGENT.to_string(), CONTENT_AGENT.to_string()]
}

fn default_openai_host() -> String {
    openai::OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    openai::OPENAI_MODEL.to_string()
}

fn default_ollama_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    ollama::OLLAMA_MODEL.to_string()
}

fn default_search_host() -> String {
    SEARCH_HOST.to_string()
}

fn default_search_max_results() -> u32 {
    SEARCH_MAX_RESULTS
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}
