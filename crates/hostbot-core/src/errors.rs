/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type. The `Display`
/// output is what ends up in front of the user when a host or telemetry call
/// fails, so variants carry the underlying detail verbatim.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{program}: {detail}")]
    Command { program: String, detail: String },

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn command(program: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
