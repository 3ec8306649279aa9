use std::io;
use std::path::PathBuf;

/// Result type for all engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A required external tool is not on PATH. Raised before any spawn
    /// attempt so callers fail fast with an actionable message.
    #[error("required binary not found: {name} – install it and re-run")]
    MissingBinary { name: String },

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with code {code}")]
    Execution { command: String, code: i32 },

    #[error("no dev-server endpoint became reachable within {waited_secs}s")]
    ReadinessTimeout { waited_secs: u64 },

    /// An external tool exists but lacks an expected feature. The hint names
    /// the exact command to run manually; the engine never guesses an
    /// alternate invocation form.
    #[error("{tool} does not support '{capability}' – {hint}")]
    CapabilityUnavailable {
        tool: String,
        capability: String,
        hint: String,
    },

    #[error("workspace operation failed on {path}: {source}")]
    WorkspaceIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl EngineError {
    pub fn workspace(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::WorkspaceIo {
            path: path.into(),
            source,
        }
    }
}
