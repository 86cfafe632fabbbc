use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Duration;

use aiove_shared::greeter::{print_greeter, print_thanks};
use aiove_shared::locator::{FFMPEG, FFPROBE, RIFE, WAIFU2X};
use aiove_shared::logging::init_logging;
use aiove_shared::paths::{absolute_path, resolve_root, Directories};
use aiove_shared::prelude::Prelude;
use aiove_shared::*;
use anyhow::{anyhow, Context as _};
use clap::Parser;
use clearscreen::clear;
use colored::Colorize;
use tracing::{info, warn};

fn main() {
    let args = Args::parse();
    let banner = !args.no_banner;

    if let Err(err) = run(args) {
        eprintln!("{} {:#}", "error:".bright_red(), err);
        exit(1);
    }
    if banner {
        print_thanks();
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let root = resolve_root(args.root.as_deref())?;
    let dirs = Directories::load(&root)?;
    let prelude = Prelude::new(&root)
        .load_or_create()
        .with_context(|| format!("loading the prelude from [{}]", root.display()))?;

    // Flushes the log file when dropped at the end of `run`.
    let _guard = init_logging(&prelude.logging, &dirs.log_file)?;

    if !args.no_banner {
        if let Err(e) = clear() {
            warn!("Failed to clear screen: {}", e);
        }
        print_greeter();
    }

    info!("Install root is [{}]", root.display());
    let mut context = Context::initialize(dirs, prelude)?;
    if context.stop_at_initialization() {
        info!("Stopping at initialization as the prelude asks");
        return Ok(());
    }

    dispatch(&mut context, args.command)
}

fn dispatch(context: &mut Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run {
            input,
            output,
            profile,
            session,
            no_interpolate,
            no_upscale,
        } => {
            let mut runtime = context.runtime_data();
            let input = input
                .map(PathBuf::from)
                .or_else(|| runtime.input_video())
                .ok_or_else(|| anyhow!("no input video given and none remembered, pass -i"))?;
            let output = output
                .map(PathBuf::from)
                .or_else(|| runtime.output_video())
                .ok_or_else(|| anyhow!("no output video given and none remembered, pass -o"))?;
            let profile_name = profile.unwrap_or_else(|| runtime.last_profile.clone());

            let mut profile = context.profiles.load(&profile_name)?;
            if no_interpolate {
                profile.interpolation.enabled = false;
            }
            if no_upscale {
                profile.upscale.enabled = false;
            }

            runtime.remember_run(&input, &output, &profile_name)?;
            let job = Job {
                input: absolute_path(&input)?,
                output: absolute_path(&output)?,
                session,
                profile,
            };
            context.runtime.update(runtime)?;
            let report = Pipeline::new(context).run(&job)?;
            print_report(&report);
        }
        Command::Probe { input } => {
            let info = context.ffmpeg_wrapper()?.get_video_info(Path::new(&input))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Session { name: None } => {
            for name in context.sessions.list()? {
                println!("{}", name);
            }
        }
        Command::Session { name: Some(name) } => {
            let session = context.sessions.setup(&name)?;
            println!("{} {}", "session:".green(), session.name);
            println!("  root                     {}", session.root.display());
            println!("  in_original_frames       {}", session.input_original_frames.display());
            println!("  out_interpolated_frames  {}", session.output_interpolated_frames.display());
            println!("  out_upscaled_frames      {}", session.output_upscaled_frames.display());
        }
        Command::Check => {
            let mut missing = Vec::new();
            for name in [FFMPEG, FFPROBE, RIFE, WAIFU2X] {
                match context.locator.find(name) {
                    Ok(path) => println!("{:<20} {}", name.green(), path.display()),
                    Err(e) => {
                        println!("{:<20} {}", name.red(), "not found".red());
                        missing.push(e);
                    }
                }
            }
            if let Some(first) = missing.into_iter().next() {
                return Err(first.into());
            }
        }
        Command::Profiles => {
            let last = context.runtime_data().last_profile;
            for name in context.profiles.list()? {
                if name == last {
                    println!("{} {}", name.green(), "(last used)".yellow());
                } else {
                    println!("{}", name);
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    let stages: Vec<String> = report.stages.iter().map(|s| s.to_string()).collect();
    println!("{} {}", "finished:".green(), report.output.display());
    println!("  session   {}", report.session);
    println!("  stages    {}", stages.join(" -> "));
    println!(
        "  fps       {} ({:.3})",
        report.output_fps,
        report.output_fps.as_f64()
    );
    println!(
        "  size      {}x{}",
        report.output_size[0], report.output_size[1]
    );
    println!("  elapsed   {}", format_elapsed(report.elapsed));
}

fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs() % 60;
    let minutes = (elapsed.as_secs() / 60) % 60;
    let hours = (elapsed.as_secs() / 60) / 60;
    format!("{}h:{}m:{}s", hours, minutes, seconds)
}
