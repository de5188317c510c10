use crate::randomizer::ledger::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const NEXT_BUTTON_LABEL: &str = "➡️ Next";
pub const COMMAND_FAILED_MESSAGE: &str =
    "❌ Something went wrong and the pick was not saved. Please try again.";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub randomizer: RandomizerConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RandomizerConfig {
    #[serde(default = "default_history_path")]
    pub(crate) history_path: PathBuf,
    #[serde(default = "default_history_limit")]
    pub(crate) history_limit: usize,
    #[serde(default = "default_next_button_timeout_secs")]
    pub(crate) next_button_timeout_secs: u64,
}

impl Default for RandomizerConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            history_limit: default_history_limit(),
            next_button_timeout_secs: default_next_button_timeout_secs(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("history.json")
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_next_button_timeout_secs() -> u64 {
    300
}

impl Config {
    /// Reads `randomizer/config.toml` if present, then `RANDOMIZER__*` environment variables.
    pub(crate) fn new() -> anyhow::Result<Self> {
        let s = config::Config::builder()
            .add_source(config::File::with_name("randomizer/config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(s.try_deserialize()?)
    }
}
