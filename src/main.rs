// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "phototimer")]
#[command(about = "Countdown photo timer tools: preview pacing and thumbnail cache")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the adaptive frame pacer against the real clock
    Pace {
        /// Number of frames to pace
        #[arg(short, long, default_value = "300")]
        frames: u64,

        /// Target frame rate ladder, fastest first (default: from config)
        #[arg(short, long, value_delimiter = ',')]
        target: Vec<f64>,

        /// Minimum acceptable rate per tier, one fewer than targets
        #[arg(short, long, value_delimiter = ',')]
        minimum: Vec<f64>,
    },

    /// Produce a scaled bitmap and persist its thumbnail
    Thumbnail {
        /// Source image
        image: PathBuf,

        /// Minimum output width
        #[arg(short = 'W', long, default_value = "256")]
        width: u32,

        /// Minimum output height
        #[arg(short = 'H', long, default_value = "256")]
        height: u32,

        /// Thumbnail directory (default: platform cache dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Pre-generate thumbnails for every image in a directory
    Warm {
        /// Directory of source images
        dir: PathBuf,

        /// Minimum thumbnail size (both dimensions)
        #[arg(short, long, default_value = "256")]
        size: u32,
    },

    /// Run an epoch-guarded capture countdown
    Countdown {
        /// Seconds to count down
        #[arg(short, long, default_value = "3")]
        seconds: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=phototimer=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pace {
            frames,
            target,
            minimum,
        } => cli::run_pace(frames, target, minimum)?,
        Commands::Thumbnail {
            image,
            width,
            height,
            out_dir,
        } => cli::run_thumbnail(image, width, height, out_dir)?,
        Commands::Warm { dir, size } => {
            tokio::runtime::Runtime::new()?.block_on(cli::run_warm(dir, size))?
        }
        Commands::Countdown { seconds } => {
            tokio::runtime::Runtime::new()?.block_on(cli::run_countdown(seconds))?
        }
    }

    Ok(())
}
