// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use privacy_gate::constants::DEFAULT_BLUR_SIGMA;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "privacy-gate")]
#[command(about = "Blur video frames unless a face is visible")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Blur a single image
    Blur {
        /// Input image (png, jpg, ...)
        input: PathBuf,

        /// Output file path (default: <input>_blurred.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Gaussian sigma
        #[arg(short, long, default_value_t = DEFAULT_BLUR_SIGMA)]
        sigma: f32,
    },

    /// Show the rotation applied to frames for a camera and device state
    Orientation {
        /// Sensor orientation in degrees
        #[arg(long)]
        sensor: i32,

        /// Device rotation in degrees (0, 90, 180, 270)
        #[arg(long, default_value = "0")]
        device: i32,

        /// Camera is front-facing
        #[arg(long)]
        front: bool,

        /// Auto-rotate is enabled (the capturer's hint is used)
        #[arg(long)]
        auto_rotate: bool,

        /// Capturer rotation hint in degrees
        #[arg(long, default_value = "0")]
        hint: i32,
    },

    /// Run a sequence of images through the privacy gate
    Run {
        /// Input images, in capture order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// SeetaFace model file (seeta_fd_frontal_v1.0.bin)
        #[arg(short, long)]
        model: PathBuf,

        /// Output directory (default: ~/Pictures/PrivacyGate/run_TIMESTAMP)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run face detection every N frames
        #[arg(short, long)]
        interval: Option<u32>,

        /// Gaussian sigma for frames without a face
        #[arg(short, long)]
        sigma: Option<f32>,

        /// Config file (default: ~/.config/privacy-gate/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=privacy_gate=debug
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
        Commands::Blur {
            input,
            output,
            sigma,
        } => cli::blur_image(input, output, sigma),
        Commands::Orientation {
            sensor,
            device,
            front,
            auto_rotate,
            hint,
        } => cli::print_orientation(sensor, device, front, auto_rotate, hint),
        Commands::Run {
            inputs,
            model,
            output,
            interval,
            sigma,
            config,
        } => cli::run_frames(cli::RunOptions {
            inputs,
            model,
            output,
            interval,
            sigma,
            config,
        }),
    }
}
