use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use armscript::config::Settings;
use armscript::environment::Environment;
use armscript::interpreter::Interpreter;
use armscript::script::VariantRegistry;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the .task script to run
    script: PathBuf,

    /// Optional settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the tick rate from the settings
    #[arg(long)]
    fps: Option<u32>,

    /// How long to let the script run before stopping, in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(fps) = cli.fps {
        settings.script_fps = fps;
    }

    // No hardware discovery in the runner; scripts drive the offline
    // stand-ins unless an embedder wires real drivers in.
    let environment = Environment::offline(settings.clone());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(settings);

    let report = interpreter.load_script_file(&cli.script, &registry)?;
    if report.is_empty() {
        info!("Loaded {} events from {}", interpreter.event_count(), cli.script.display());
    } else {
        for (fault, tags) in &report {
            warn!("{fault}: {tags:?}");
        }
    }

    interpreter.start(environment.robot(), environment.vision())?;
    info!("Running for {} seconds...", cli.duration);
    thread::sleep(Duration::from_secs(cli.duration));

    // Collaborators are shut down even when the stop fails; a stuck
    // worker is exactly when the hardware must still be told to exit.
    if let Err(err) = interpreter.stop(environment.robot(), environment.vision()) {
        warn!("Stop failed: {err}");
    }
    environment.close();
    info!("Done");
    Ok(())
}
