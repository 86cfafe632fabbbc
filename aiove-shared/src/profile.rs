//! Named bundles of enhancement settings stored as `<profiles>/<name>.yaml`.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AioError, Result};
use crate::wrappers::ffmpeg::EncodeOptions;
use crate::wrappers::rife::RifeOptions;
use crate::wrappers::waifu2x::Waifu2xOptions;

pub const PROFILE_EXTENSION: &str = "yaml";
pub const BUILTIN_PROFILES: [&str; 2] = ["anime", "generic"];

const IMAGE_FORMATS: [&str; 3] = ["png", "jpg", "webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub rife: RifeOptions,
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rife: RifeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleSettings {
    pub enabled: bool,
    #[serde(flatten)]
    pub waifu2x: Waifu2xOptions,
}

impl Default for UpscaleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            waifu2x: Waifu2xOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Image format of every intermediate frame sequence.
    pub image_format: String,
    pub interpolation: InterpolationSettings,
    pub upscale: UpscaleSettings,
    pub encode: EncodeOptions,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            image_format: "png".to_string(),
            interpolation: InterpolationSettings::default(),
            upscale: UpscaleSettings::default(),
            encode: EncodeOptions::default(),
        }
    }
}

impl Profile {
    /// The profiles written on first run.
    pub fn builtin(name: &str) -> Option<Profile> {
        match name {
            "anime" => Some(Profile::default()),
            "generic" => Some(Profile {
                interpolation: InterpolationSettings {
                    enabled: true,
                    rife: RifeOptions {
                        model: Some("rife".to_string()),
                        ..RifeOptions::default()
                    },
                },
                upscale: UpscaleSettings {
                    enabled: true,
                    waifu2x: Waifu2xOptions {
                        model: Some("models-cunet".to_string()),
                        noise_level: 1,
                        ..Waifu2xOptions::default()
                    },
                },
                ..Profile::default()
            }),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !IMAGE_FORMATS.contains(&self.image_format.as_str()) {
            return Err(AioError::Config(format!(
                "image format must be one of {:?}, got {:?}",
                IMAGE_FORMATS, self.image_format
            )));
        }
        if self.encode.crf > 51 {
            return Err(AioError::Config(format!(
                "crf must be within 0..=51, got {}",
                self.encode.crf
            )));
        }
        if self.upscale.enabled {
            self.upscale.waifu2x.validate()?;
        }
        Ok(())
    }
}

pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `<dir>/<name>.yaml`, `name` may already carry the extension.
    pub fn path_of(&self, name: &str) -> PathBuf {
        let stem = name
            .strip_suffix(&format!(".{}", PROFILE_EXTENSION))
            .unwrap_or(name);
        self.dir.join(format!("{}.{}", stem, PROFILE_EXTENSION))
    }

    pub fn load(&self, name: &str) -> Result<Profile> {
        let path = self.path_of(name);
        debug!("Profile [{}] should be located at [{}]", name, path.display());

        if !path.is_file() {
            return Err(AioError::Config(format!(
                "profile [{}] not found at [{}]",
                name,
                path.display()
            )));
        }

        let profile: Profile = serde_yaml::from_str(&fs::read_to_string(&path)?)?;
        profile.validate()?;
        info!("Loaded profile [{}]", name);
        debug!("Profile [{}] is {:?}", name, profile);
        Ok(profile)
    }

    pub fn save(&self, name: &str, profile: &Profile) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_of(name), serde_yaml::to_string(profile)?)?;
        Ok(())
    }

    /// Writes the built-in profiles that are not on disk yet.
    pub fn ensure_builtin(&self) -> Result<()> {
        for name in BUILTIN_PROFILES {
            if self.path_of(name).exists() {
                continue;
            }
            if let Some(profile) = Profile::builtin(name) {
                info!("Writing built-in profile [{}]", name);
                self.save(name, &profile)?;
            }
        }
        Ok(())
    }

    /// Profile names found in the directory, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(PROFILE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
