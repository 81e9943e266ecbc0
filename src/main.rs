use clap::Parser;
use overlay_recorder_lib::config::{AppConfig, BackendKind};
use std::path::PathBuf;
use std::time::Duration;

/// Record camera feeds alongside a composited detection overlay
#[derive(Parser, Debug)]
#[command(name = "overlay-recorder", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory finished recordings are published to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of synthetic cameras
    #[arg(long)]
    cameras: Option<usize>,

    /// Device backend
    #[arg(long, value_parser = ["synthetic", "webcam"])]
    backend: Option<String>,

    /// Fixed detection seed
    #[arg(long)]
    seed: Option<u64>,

    /// Record once for this many seconds instead of reading commands
    #[arg(long)]
    duration_secs: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(cameras) = self.cameras {
            config.synthetic_cameras = cameras;
        }
        if let Some(backend) = self.backend.as_deref() {
            config.backend = match backend {
                "webcam" => BackendKind::Webcam,
                _ => BackendKind::Synthetic,
            };
        }
        if let Some(seed) = self.seed {
            config.detection_seed = Some(seed);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    overlay_recorder_lib::init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    overlay_recorder_lib::run(config, cli.duration_secs.map(Duration::from_secs)).await
}
