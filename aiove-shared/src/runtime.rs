use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AioError, Result};
use crate::paths::absolute_path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => f.write_str("Dark"),
            Theme::Light => f.write_str("Light"),
        }
    }
}

/// Last-used settings, persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeData {
    pub last_profile: String,
    pub input_video: String,
    pub output_video: String,
    pub theme: Theme,
}

impl Default for RuntimeData {
    fn default() -> Self {
        Self {
            last_profile: "anime".to_string(),
            input_video: String::new(),
            output_video: String::new(),
            theme: Theme::Dark,
        }
    }
}

impl RuntimeData {
    /// Empty strings mean "never set".
    pub fn input_video(&self) -> Option<PathBuf> {
        non_empty(&self.input_video)
    }

    pub fn output_video(&self) -> Option<PathBuf> {
        non_empty(&self.output_video)
    }

    /// Records the settings of a run, paths made absolute so the next run
    /// finds them from any working directory.
    pub fn remember_run(&mut self, input: &Path, output: &Path, profile: &str) -> Result<()> {
        self.input_video = absolute_path(input)?.to_string_lossy().into_owned();
        self.output_video = absolute_path(output)?.to_string_lossy().into_owned();
        self.last_profile = profile.to_string();
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

pub struct RuntimeState {
    path: PathBuf,
    content: Option<RuntimeData>,
}

impl RuntimeState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            content: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the runtime file, writing the default one first if it does not exist.
    pub fn load_or_create(&mut self) -> Result<RuntimeData> {
        if !self.path.exists() {
            info!("No runtime file yet, creating [{}]", self.path.display());
            return self.create_default_file();
        }

        let raw = fs::read_to_string(&self.path)?;
        let data: RuntimeData = if raw.trim().is_empty() {
            RuntimeData::default()
        } else {
            serde_yaml::from_str(&raw)?
        };
        debug!("Runtime state is {:?}", data);
        self.content = Some(data.clone());
        Ok(data)
    }

    pub fn data(&self) -> Option<&RuntimeData> {
        self.content.as_ref()
    }

    /// Replaces the held state and writes it to disk.
    pub fn update(&mut self, data: RuntimeData) -> Result<()> {
        self.content = Some(data);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| AioError::Config("no runtime state loaded to save".to_string()))?;
        fs::write(&self.path, serde_yaml::to_string(content)?)?;
        Ok(())
    }

    pub fn create_default_file(&mut self) -> Result<RuntimeData> {
        let data = RuntimeData::default();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&data)?)?;
        self.content = Some(data.clone());
        Ok(data)
    }
}
