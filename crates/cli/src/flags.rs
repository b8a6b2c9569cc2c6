use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which embedding provider backs the semantic path
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EmbedMode {
    #[default]
    Ollama,
    Stub,
    /// Lexical-only retrieval
    #[value(name = "none")]
    #[serde(rename = "none")]
    Disabled,
}

impl EmbedMode {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Ollama => "ollama",
            EmbedMode::Stub => "stub",
            EmbedMode::Disabled => "none",
        }
    }
}

impl std::fmt::Display for EmbedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
