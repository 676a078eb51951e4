//! fOS Player - Main Entry Point
//!
//! Scripts run on a dedicated thread owning the JavaScript host; the
//! main thread owns the window and paces frames.

mod app;
mod profile;
mod project;

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use fos_js::{FrameLink, Host, HostConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::profile::{Profile, ProfileLayer};
use crate::project::Project;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "fos-player", version, about)]
struct Cli {
    /// Project directory containing index.html
    project_dir: PathBuf,

    /// Write span timings to FILE on exit
    #[arg(long, value_name = "FILE")]
    cpuprofile: Option<PathBuf>,

    /// Integer window scale
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=8))]
    scale: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let profile = init_logging(cli.cpuprofile.is_some());

    let result = run(&cli);

    if let (Some(path), Some(profile)) = (&cli.cpuprofile, &profile) {
        if let Err(err) = profile.write(path) {
            eprintln!("error: {err:#}");
        }
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, `info` unless `RUST_LOG` says otherwise. The profile
/// layer sees every span regardless of the filter.
fn init_logging(profile: bool) -> Option<Profile> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let (layer, profile) = match profile {
        true => {
            let (layer, profile) = ProfileLayer::new();
            (Some(layer), Some(profile))
        }
        false => (None, None),
    };
    tracing_subscriber::registry().with(fmt).with(layer).init();
    profile
}

fn run(cli: &Cli) -> Result<()> {
    let dir = cli
        .project_dir
        .canonicalize()
        .with_context(|| format!("cannot open {}", cli.project_dir.display()))?;
    let project = Project::open(&dir)?;
    tracing::info!(dir = %project.dir.display(), "starting fOS Player");

    let config = HostConfig::new(&project.dir)
        .with_screen_size(project.window.width, project.window.height);
    let scripts = project.scripts.clone();
    let (render, link) = fos_js::frame_channel();

    let script_thread = thread::Builder::new()
        .name("script".into())
        .spawn(move || run_scripts(config, &scripts, &link))
        .context("cannot start script thread")?;

    // returns once the window closes or the script thread hangs up
    let app_result = app::run(render, &project.window, cli.scale);

    let script_result = script_thread
        .join()
        .map_err(|_| anyhow!("script thread panicked"))?;
    script_result.context("script error")?;
    app_result
}

/// Script thread body; the host never leaves this thread
fn run_scripts(config: HostConfig, scripts: &[String], link: &FrameLink) -> fos_js::Result<()> {
    let mut host = Host::new(config)?;
    for script in scripts {
        host.enqueue_script(script);
    }
    host.run(link)
}
