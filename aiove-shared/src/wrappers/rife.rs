use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{arg, frames_bar, resolve_model, run_streaming};
use crate::error::Result;

/// Settings for one RIFE run. Models shipped with nihui's release are
/// `rife`, `rife-anime`, `rife-HD` and `rife-UHD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RifeOptions {
    pub model: Option<String>,
    pub gpu_id: u32,
    pub load_proc_save: String,
    /// Test-time augmentation, slow.
    pub tta: bool,
    pub uhd: bool,
}

impl Default for RifeOptions {
    fn default() -> Self {
        Self {
            model: Some("rife-anime".to_string()),
            gpu_id: 0,
            load_proc_save: "4:4:4".to_string(),
            tta: false,
            uhd: false,
        }
    }
}

pub struct RifeWrapper {
    binary: PathBuf,
}

impl RifeWrapper {
    pub fn new(binary: PathBuf) -> Self {
        info!("Rife binary is: [{}]", binary.display());
        Self { binary }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Full argument vector, resolving the model first.
    pub fn build_args(
        &self,
        src: &Path,
        dst: &Path,
        output_format: &str,
        options: &RifeOptions,
    ) -> Result<Vec<OsString>> {
        let mut args = vec![
            arg("-i"),
            arg(src),
            arg("-o"),
            arg(dst),
            arg("-g"),
            arg(options.gpu_id.to_string()),
            arg("-j"),
            arg(&options.load_proc_save),
            arg("-f"),
            arg(output_format),
        ];

        if let Some(model) = &options.model {
            args.push(arg("-m"));
            args.push(arg(resolve_model(&self.binary, model)?));
        }
        if options.tta {
            args.push(arg("-x"));
        }
        if options.uhd {
            args.push(arg("-u"));
        }
        Ok(args)
    }

    /// Interpolates every frame of `src` into `dst`.
    pub fn execute(
        &self,
        src: &Path,
        dst: &Path,
        output_format: &str,
        options: &RifeOptions,
    ) -> Result<()> {
        let args = self.build_args(src, dst, output_format, options)?;
        let bar = frames_bar(None, "rife");
        bar.set_message("interpolating");

        run_streaming("rife-ncnn-vulkan", &self.binary, &args, |line| {
            bar.set_message(line.to_string());
            bar.tick();
        })?;
        bar.finish_and_clear();
        Ok(())
    }
}
