use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{arg, frames_bar, resolve_model, run_streaming};
use crate::error::{AioError, Result};

const VALID_SCALES: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Settings for one Waifu2x run. Models shipped with nihui's release are
/// `models-cunet`, `models-upconv_7_anime_style_art_rgb` and
/// `models-upconv_7_photo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Waifu2xOptions {
    pub model: Option<String>,
    /// -1 (none) to 3.
    pub noise_level: i32,
    pub scale: u32,
    /// 0 lets the tool pick.
    pub tile_size: u32,
    pub load_proc_save: String,
    pub gpu_id: Option<u32>,
    pub tta: bool,
}

impl Default for Waifu2xOptions {
    fn default() -> Self {
        Self {
            model: Some("models-upconv_7_anime_style_art_rgb".to_string()),
            noise_level: 3,
            scale: 2,
            tile_size: 200,
            load_proc_save: "4:4:4".to_string(),
            gpu_id: None,
            tta: false,
        }
    }
}

impl Waifu2xOptions {
    pub fn validate(&self) -> Result<()> {
        if !(-1..=3).contains(&self.noise_level) {
            return Err(AioError::Config(format!(
                "waifu2x noise level must be within -1..=3, got {}",
                self.noise_level
            )));
        }
        if !VALID_SCALES.contains(&self.scale) {
            return Err(AioError::Config(format!(
                "waifu2x scale must be one of {:?}, got {}",
                VALID_SCALES, self.scale
            )));
        }
        if self.tile_size != 0 && self.tile_size < 32 {
            return Err(AioError::Config(format!(
                "waifu2x tile size must be 0 or at least 32, got {}",
                self.tile_size
            )));
        }
        Ok(())
    }
}

pub struct Waifu2xWrapper {
    binary: PathBuf,
}

impl Waifu2xWrapper {
    pub fn new(binary: PathBuf) -> Self {
        info!("Waifu2x Vulkan binary is: [{}]", binary.display());
        Self { binary }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn build_args(
        &self,
        src: &Path,
        dst: &Path,
        output_format: &str,
        options: &Waifu2xOptions,
    ) -> Result<Vec<OsString>> {
        options.validate()?;

        let mut args = vec![
            arg("-i"),
            arg(src),
            arg("-o"),
            arg(dst),
            arg("-n"),
            arg(options.noise_level.to_string()),
            arg("-s"),
            arg(options.scale.to_string()),
            arg("-j"),
            arg(&options.load_proc_save),
            arg("-t"),
            arg(options.tile_size.to_string()),
            arg("-f"),
            arg(output_format),
        ];

        if let Some(gpu_id) = options.gpu_id {
            args.push(arg("-g"));
            args.push(arg(gpu_id.to_string()));
        }
        if let Some(model) = &options.model {
            args.push(arg("-m"));
            args.push(arg(resolve_model(&self.binary, model)?));
        }
        if options.tta {
            args.push(arg("-x"));
        }
        Ok(args)
    }

    /// Upscales every frame of `src` into `dst`.
    pub fn execute(
        &self,
        src: &Path,
        dst: &Path,
        output_format: &str,
        options: &Waifu2xOptions,
    ) -> Result<()> {
        let args = self.build_args(src, dst, output_format, options)?;
        let bar = frames_bar(None, "waifu2x");
        bar.set_message("upscaling");

        run_streaming("waifu2x-ncnn-vulkan", &self.binary, &args, |line| {
            bar.set_message(line.to_string());
            bar.tick();
        })?;
        bar.finish_and_clear();
        Ok(())
    }
}
