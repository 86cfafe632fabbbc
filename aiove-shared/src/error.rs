use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AioError {
    #[error("could not find binary [{name}] in PATH or in {searched:?}")]
    MissingBinary { name: String, searched: Vec<PathBuf> },

    #[error("model [{model}] does not have a model directory at [{}]", path.display())]
    ModelNotFound { model: String, path: PathBuf },

    #[error("{tool} exited with {status}: {stderr_tail}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr_tail: String,
    },

    #[error("could not parse {what} from tool output: {output:?}")]
    Parse { what: &'static str, output: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid session name: {0:?}")]
    InvalidSession(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AioError {
    pub fn parse(what: &'static str, output: impl Into<String>) -> Self {
        Self::Parse {
            what,
            output: output.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AioError>;
