//! Pipeline configuration.

use tracing::trace;

/// Actor runtime tuning knobs.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ActorConfig {
    /// How long `shutdown` waits for in-flight mailbox drains, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub actor: ActorConfig,

    /// Display name of the root rule chain built by the pipeline facade.
    #[serde(default = "default_root_chain_name")]
    pub root_chain_name: String,

    /// Queue assigned to messages from profiles without an explicit queue.
    #[serde(default = "default_queue_name")]
    pub default_queue: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            actor: ActorConfig::default(),
            root_chain_name: default_root_chain_name(),
            default_queue: default_queue_name(),
        }
    }
}

fn default_queue_name() -> String {
    crate::message::DEFAULT_QUEUE.to_string()
}

fn default_root_chain_name() -> String {
    "Root Rule Chain".to_string()
}

pub fn read_config_file(path: &str) -> anyhow::Result<PipelineConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
