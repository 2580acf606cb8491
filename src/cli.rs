// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Blurring a single image
//! - Computing orientation compensation
//! - Running image sequences through a frame gate

use chrono::Local;
use privacy_gate::constants::DEFAULT_OUTPUT_FOLDER;
use privacy_gate::detection::{FaceDetect, OrientedImage};
use privacy_gate::errors::{OrientationError, PipelineResult};
use privacy_gate::orientation::{
    CameraCharacteristics, CameraFacing, DeviceRotation, DeviceState, OrientationResolver,
    resolve_rotation,
};
use privacy_gate::{BlurTransform, CaptureLoopController, Config, Frame, FrameGate, Rotation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Nominal spacing between synthetic capture timestamps (30 fps)
const FRAME_PERIOD_NS: i64 = 33_333_333;

/// Blur one image file
pub fn blur_image(
    input: PathBuf,
    output: Option<PathBuf>,
    sigma: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::open(&input)?.to_rgba8();
    println!(
        "Input: {} ({}x{})",
        input.display(),
        image.width(),
        image.height()
    );

    let frame = Frame::from_rgba_image(image, Rotation::None, 0)?;
    let start = Instant::now();
    let blurred = BlurTransform::default().apply(&frame, sigma)?;
    let elapsed = start.elapsed();

    let output_path = output.unwrap_or_else(|| blurred_path(&input));
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    blurred.to_rgba_image()?.save(&output_path)?;

    println!("Sigma: {} ({} ms)", sigma, elapsed.as_millis());
    println!("Saved: {}", output_path.display());
    Ok(())
}

/// Print the rotation applied to a frame for the given camera and device state
pub fn print_orientation(
    sensor: i32,
    device: i32,
    front: bool,
    auto_rotate: bool,
    hint: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let sensor_orientation =
        Rotation::from_degrees(sensor).ok_or(OrientationError::InvalidSensorOrientation(sensor))?;
    let rotation = DeviceRotation::from_degrees(device)
        .ok_or_else(|| format!("Device rotation must be 0, 90, 180 or 270 (got {})", device))?;
    let hint = Rotation::from_degrees(hint)
        .ok_or_else(|| format!("Hint must be a multiple of 90 (got {})", hint))?;
    let facing = if front {
        CameraFacing::Front
    } else {
        CameraFacing::Back
    };

    let resolved = resolve_rotation(
        hint,
        &DeviceState {
            rotation,
            auto_rotate,
        },
        &CameraCharacteristics {
            sensor_orientation,
            facing,
        },
    );

    println!("Sensor:      {}", sensor_orientation);
    println!("Device:      {}°", rotation.degrees());
    println!("Facing:      {:?}", facing);
    println!("Auto-rotate: {}", auto_rotate);
    println!("Rotation:    {}", resolved);
    Ok(())
}

/// Options for [`run_frames`]
pub struct RunOptions {
    pub inputs: Vec<PathBuf>,
    pub model: PathBuf,
    pub output: Option<PathBuf>,
    pub interval: Option<u32>,
    pub sigma: Option<f32>,
    pub config: Option<PathBuf>,
}

/// Feed image files through a frame gate as a capture sequence
pub fn run_frames(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    if options.inputs.is_empty() {
        return Err("No input images given".into());
    }

    let mut config = match options.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    if let Some(interval) = options.interval {
        config.face_detecting_frame_interval = interval;
    }
    if let Some(sigma) = options.sigma {
        config.blur_sigma = sigma;
    }

    let mut detector = load_detector(&options.model)?;
    let detector = move |image: &OrientedImage| detector.detect(image);

    // Files are already upright; auto-rotate passes the (zero) hint through
    let resolver = OrientationResolver::new(DeviceState {
        rotation: DeviceRotation::Rotation0,
        auto_rotate: true,
    });
    let gate = Arc::new(FrameGate::new(&config, resolver, detector)?);
    let stats = gate.stats();

    let output_dir = match options.output {
        Some(dir) => dir,
        None => default_run_dir(),
    };
    std::fs::create_dir_all(&output_dir)?;

    println!("Frames:   {}", options.inputs.len());
    println!(
        "Interval: every {} frames",
        config.face_detecting_frame_interval
    );
    println!("Sigma:    {}", config.blur_sigma);
    println!("Output:   {}", output_dir.display());
    println!();
    println!("Processing... (press Ctrl+C to stop early)");

    let source = options
        .inputs
        .into_iter()
        .enumerate()
        .filter_map(|(index, path)| match load_frame(&path, index) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable input");
                None
            }
        });

    let written = Arc::new(AtomicUsize::new(0));
    let sink_written = Arc::clone(&written);
    let sink_dir = output_dir.clone();
    let sink = move |frame: Frame| {
        let index = sink_written.load(Ordering::SeqCst);
        let path = sink_dir.join(format!("frame_{:05}.png", index));
        match frame.to_rgba_image().map_err(|e| e.to_string()).and_then(|image| {
            image.save(&path).map_err(|e| e.to_string())
        }) {
            Ok(()) => {
                sink_written.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write frame"),
        }
    };

    let start = Instant::now();
    let mut controller = CaptureLoopController::start("cli-run", source, Arc::clone(&gate), sink);

    let stop_flag = controller.stop_signal();
    ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    })?;

    while controller.is_running() {
        std::thread::sleep(Duration::from_millis(50));
    }
    controller.join();

    println!();
    println!(
        "Wrote {} frames in {:.2}s",
        written.load(Ordering::SeqCst),
        start.elapsed().as_secs_f32()
    );
    println!("{}", stats.snapshot());
    Ok(())
}

#[cfg(feature = "rustface")]
fn load_detector(model: &Path) -> PipelineResult<Box<dyn FaceDetect>> {
    Ok(Box::new(privacy_gate::detection::RustfaceDetector::from_model_file(model)?))
}

#[cfg(not(feature = "rustface"))]
fn load_detector(_model: &Path) -> PipelineResult<Box<dyn FaceDetect>> {
    Err(privacy_gate::errors::DetectionError::Model(
        "built without the rustface feature".to_string(),
    )
    .into())
}

fn load_frame(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let image = image::open(path)?.to_rgba8();
    let frame = Frame::from_rgba_image(image, Rotation::None, index as i64 * FRAME_PERIOD_NS)?;
    Ok(frame)
}

/// `photo.jpg` -> `photo_blurred.png` next to the input
fn blurred_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_blurred.png", stem))
}

/// `~/Pictures/PrivacyGate/run_<timestamp>`
fn default_run_dir() -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_OUTPUT_FOLDER)
        .join(format!("run_{}", timestamp))
}
