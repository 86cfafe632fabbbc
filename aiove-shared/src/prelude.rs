use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AioError, Result};
use crate::paths::PRELUDE_FILE;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Critical,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Informational,
    Pretty,
    Economic,
    Onlymessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSection {
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub log_to_file: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Pretty,
            log_to_file: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FlowSection {
    /// Quit right after the install root is prepared.
    pub stop_at_initialization: bool,
}

/// Contents of `prelude.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreludeData {
    pub logging: LoggingSection,
    pub flow: FlowSection,
}

pub struct Prelude {
    path: PathBuf,
    content: Option<PreludeData>,
}

impl Prelude {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(PRELUDE_FILE),
            content: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the prelude file, writing the default one first if it does not exist.
    pub fn load_or_create(&mut self) -> Result<PreludeData> {
        if !self.path.exists() {
            return self.create_default_file();
        }

        let raw = fs::read_to_string(&self.path)?;
        let data: PreludeData = if raw.trim().is_empty() {
            PreludeData::default()
        } else {
            toml::from_str(&raw)?
        };
        self.content = Some(data.clone());
        Ok(data)
    }

    pub fn save(&self) -> Result<()> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| AioError::Config("no prelude loaded to save".to_string()))?;
        fs::write(&self.path, toml::to_string_pretty(content)?)?;
        Ok(())
    }

    /// Writes the default prelude and returns it.
    pub fn create_default_file(&mut self) -> Result<PreludeData> {
        let data = PreludeData::default();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(&data)?)?;
        self.content = Some(data.clone());
        Ok(data)
    }
}
