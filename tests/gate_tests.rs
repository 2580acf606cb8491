// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the frame gate

use privacy_gate::constants::properties;
use privacy_gate::detection::OrientedImage;
use privacy_gate::errors::{BufferError, DetectionError};
use privacy_gate::frame::{NativeBuffer, Plane, SharedBuffer};
use privacy_gate::orientation::{
    DescriptorCameraInfo, DeviceRotation, DeviceState, OrientationResolver,
};
use privacy_gate::{
    CaptureLoopController, Config, Frame, FrameGate, FrameOutcome, PixelFormat, Rotation,
};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 32;

/// Buffer that counts retains/releases and can fail on demand
#[derive(Default)]
struct CountingBuffer {
    data: Vec<u8>,
    retains: AtomicUsize,
    releases: AtomicUsize,
    owner_released: AtomicBool,
    uncertain_retain: AtomicBool,
    truncated: AtomicBool,
}

impl CountingBuffer {
    fn i420() -> Arc<Self> {
        let size = (WIDTH * HEIGHT + 2 * (WIDTH / 2) * (HEIGHT / 2)) as usize;
        Arc::new(Self {
            data: (0..size).map(|i| (i % 251) as u8).collect(),
            ..Default::default()
        })
    }

    fn balanced(&self) -> bool {
        self.retains.load(Ordering::SeqCst) == self.releases.load(Ordering::SeqCst)
    }
}

impl NativeBuffer for CountingBuffer {
    fn data(&self) -> &[u8] {
        if self.truncated.load(Ordering::SeqCst) {
            &self.data[..16]
        } else {
            &self.data
        }
    }

    fn retain(&self) -> Result<(), BufferError> {
        if self.owner_released.load(Ordering::SeqCst) {
            return Err(BufferError::AlreadyReleased);
        }
        self.retains.fetch_add(1, Ordering::SeqCst);
        if self.uncertain_retain.load(Ordering::SeqCst) {
            return Err(BufferError::RetainUncertain("binder timeout".to_string()));
        }
        Ok(())
    }

    fn release(&self) -> Result<(), BufferError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        !self.owner_released.load(Ordering::SeqCst)
    }
}

fn frame_on(buffer: Arc<CountingBuffer>, rotation: Rotation, timestamp_ns: i64) -> Frame {
    let buffer: Arc<dyn NativeBuffer> = buffer;
    Frame::i420(buffer, WIDTH, HEIGHT, rotation, timestamp_ns).unwrap()
}

fn frame(timestamp_ns: i64) -> Frame {
    frame_on(CountingBuffer::i420(), Rotation::None, timestamp_ns)
}

fn unlocked() -> OrientationResolver {
    OrientationResolver::new(DeviceState {
        rotation: DeviceRotation::Rotation0,
        auto_rotate: true,
    })
}

fn config(interval: u32) -> Config {
    Config {
        face_detecting_frame_interval: interval,
        blur_sigma: 8.0,
        ..Config::default()
    }
}

/// Detector that records the dimensions it was shown
fn recording_detector(
    has_face: bool,
) -> (
    Arc<Mutex<Vec<(u32, u32)>>>,
    impl FnMut(&OrientedImage) -> Result<bool, DetectionError> + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let detector = move |image: &OrientedImage| -> Result<bool, DetectionError> {
        seen_clone
            .lock()
            .unwrap()
            .push((image.width(), image.height()));
        Ok(has_face)
    };
    (seen, detector)
}

#[test]
fn test_sink_called_once_per_frame() {
    let (_, detector) = recording_detector(true);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();

    for i in 0..5 {
        let mut calls = 0;
        let outcome = gate.process(frame(i), &mut |_: Frame| calls += 1);
        assert!(outcome.forwarded());
        assert_eq!(calls, 1);
    }
}

#[test]
fn test_detector_runs_on_interval() {
    let (seen, detector) = recording_detector(true);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();

    for i in 0..25 {
        gate.process(frame(i), &mut |_: Frame| {});
    }

    assert_eq!(seen.lock().unwrap().len(), 3);
    let stats = gate.stats_snapshot();
    assert_eq!(stats.frames, 25);
    assert_eq!(stats.detector_runs, 3);
    assert_eq!(stats.passed_through, 25);
    assert_eq!(gate.detection_state().counter, 5);
}

#[test]
fn test_interval_one_samples_every_frame() {
    let (seen, detector) = recording_detector(false);
    let gate = FrameGate::new(&config(1), unlocked(), detector).unwrap();
    for i in 0..7 {
        gate.process(frame(i), &mut |_: Frame| {});
    }
    assert_eq!(seen.lock().unwrap().len(), 7);
    assert_eq!(gate.stats_snapshot().blurred, 7);
}

#[test]
fn test_face_forwards_original_buffer() {
    let (_, detector) = recording_detector(true);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();
    let input = frame(11);

    let mut received = None;
    let outcome = gate.process(input.clone(), &mut |f: Frame| received = Some(f));

    assert_eq!(outcome, FrameOutcome::PassedThrough);
    let received = received.unwrap();
    assert!(Arc::ptr_eq(&received.buffer, &input.buffer));
}

#[test]
fn test_no_face_forwards_blurred_copy() {
    let (_, detector) = recording_detector(false);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();
    let buffer = CountingBuffer::i420();
    let input = frame_on(Arc::clone(&buffer), Rotation::Rotate180, 99);

    let mut received = None;
    let outcome = gate.process(input.clone(), &mut |f: Frame| received = Some(f));

    assert_eq!(outcome, FrameOutcome::Blurred);
    let received = received.unwrap();
    assert!(!Arc::ptr_eq(&received.buffer, &input.buffer));
    assert_eq!(received.width, WIDTH);
    assert_eq!(received.height, HEIGHT);
    assert_eq!(received.rotation, Rotation::Rotate180);
    assert_eq!(received.timestamp_ns, 99);
    assert_eq!(received.format, PixelFormat::I420);
    assert_ne!(received.buffer.data(), input.buffer.data());
    // Capturer's pixels untouched
    assert_eq!(input.buffer.data(), buffer.data.as_slice());
}

#[test]
fn test_cached_result_between_samples() {
    let results = Arc::new(Mutex::new(vec![false, true].into_iter()));
    let detector = move |_: &OrientedImage| -> Result<bool, DetectionError> {
        Ok(results.lock().unwrap().next().unwrap_or(true))
    };
    let gate = FrameGate::new(&config(3), unlocked(), detector).unwrap();

    let outcomes: Vec<FrameOutcome> = (0..6)
        .map(|i| gate.process(frame(i), &mut |_: Frame| {}))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Blurred,
            FrameOutcome::Blurred,
            FrameOutcome::Blurred,
            FrameOutcome::PassedThrough,
            FrameOutcome::PassedThrough,
            FrameOutcome::PassedThrough,
        ]
    );
}

#[test]
fn test_first_detector_failure_blurs() {
    let detector = |_: &OrientedImage| -> Result<bool, DetectionError> {
        Err(DetectionError::Model("weights missing".to_string()))
    };
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();

    let mut calls = 0;
    let outcome = gate.process(frame(0), &mut |_: Frame| calls += 1);

    assert_eq!(outcome, FrameOutcome::Blurred);
    assert_eq!(calls, 1);
    assert_eq!(gate.stats_snapshot().detection_errors, 1);
}

#[test]
fn test_detector_failure_reuses_last_result() {
    let mut first = true;
    let detector = move |_: &OrientedImage| -> Result<bool, DetectionError> {
        if std::mem::take(&mut first) {
            Ok(true)
        } else {
            Err(DetectionError::MalformedImage("bad frame".to_string()))
        }
    };
    let gate = FrameGate::new(&config(1), unlocked(), detector).unwrap();

    assert_eq!(
        gate.process(frame(0), &mut |_: Frame| {}),
        FrameOutcome::PassedThrough
    );
    assert_eq!(
        gate.process(frame(1), &mut |_: Frame| {}),
        FrameOutcome::PassedThrough
    );
    assert_eq!(gate.stats_snapshot().detection_errors, 1);
}

#[test]
fn test_orientation_failure_uses_zero_rotation() {
    // Rotation locked but no camera metadata: lookup fails
    let resolver = OrientationResolver::new(DeviceState {
        rotation: DeviceRotation::Rotation90,
        auto_rotate: false,
    });
    let (seen, detector) = recording_detector(true);
    let gate = FrameGate::new(&config(1), resolver, detector).unwrap();

    let input = frame_on(CountingBuffer::i420(), Rotation::Rotate90, 0);
    let mut calls = 0;
    let outcome = gate.process(input, &mut |_: Frame| calls += 1);

    assert_eq!(outcome, FrameOutcome::PassedThrough);
    assert_eq!(calls, 1);
    assert_eq!(seen.lock().unwrap()[0], (WIDTH, HEIGHT));
    assert_eq!(gate.stats_snapshot().orientation_errors, 1);
}

#[test]
fn test_locked_rotation_orients_detection_image() {
    let mut cameras = HashMap::new();
    cameras.insert(
        "back".to_string(),
        HashMap::from([
            (properties::ROTATION.to_string(), "90".to_string()),
            (properties::LOCATION.to_string(), "back".to_string()),
        ]),
    );
    let resolver = OrientationResolver::new(DeviceState {
        rotation: DeviceRotation::Rotation0,
        auto_rotate: false,
    })
    .with_provider(DescriptorCameraInfo::new(cameras));

    let (seen, detector) = recording_detector(true);
    let config = Config {
        camera_id: Some("back".to_string()),
        ..config(1)
    };
    let gate = FrameGate::new(&config, resolver, detector).unwrap();
    gate.process(frame(0), &mut |_: Frame| {});

    assert_eq!(seen.lock().unwrap()[0], (HEIGHT, WIDTH));
    assert_eq!(gate.stats_snapshot().orientation_errors, 0);
}

#[test]
fn test_retain_release_balanced_on_every_path() {
    let mut ok = true;
    let detector = move |_: &OrientedImage| -> Result<bool, DetectionError> {
        ok = !ok;
        if ok {
            Ok(false)
        } else {
            Err(DetectionError::Model("flaky".to_string()))
        }
    };
    let resolver = OrientationResolver::new(DeviceState {
        rotation: DeviceRotation::Rotation0,
        auto_rotate: false,
    });
    let gate = FrameGate::new(&config(1), resolver, detector).unwrap();

    let buffers: Vec<Arc<CountingBuffer>> = (0..6).map(|_| CountingBuffer::i420()).collect();
    for (i, buffer) in buffers.iter().enumerate() {
        let input = frame_on(Arc::clone(buffer), Rotation::None, i as i64);
        if i == 3 {
            // Shorter than its validated layout: plane reads fail
            buffer.truncated.store(true, Ordering::SeqCst);
        }
        gate.process(input, &mut |_: Frame| {});
    }

    for buffer in &buffers {
        assert_eq!(buffer.retains.load(Ordering::SeqCst), 1);
        assert!(buffer.balanced());
    }
    let stats = gate.stats_snapshot();
    assert_eq!(stats.retains, 6);
    assert_eq!(stats.releases, 6);
    assert_eq!(stats.blur_errors, 1);
}

#[test]
fn test_blur_failure_forwards_original() {
    let (_, detector) = recording_detector(false);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();
    let buffer = CountingBuffer::i420();
    let input = frame_on(Arc::clone(&buffer), Rotation::None, 0);
    buffer.truncated.store(true, Ordering::SeqCst);

    let mut received = None;
    let outcome = gate.process(input.clone(), &mut |f: Frame| received = Some(f));

    assert_eq!(outcome, FrameOutcome::BlurFailed);
    assert!(Arc::ptr_eq(&received.unwrap().buffer, &input.buffer));
    assert!(buffer.balanced());
}

#[test]
fn test_released_buffer_dropped_without_sink() {
    let (seen, detector) = recording_detector(true);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();
    let buffer = CountingBuffer::i420();
    let input = frame_on(Arc::clone(&buffer), Rotation::None, 0);
    buffer.owner_released.store(true, Ordering::SeqCst);

    let mut calls = 0;
    let outcome = gate.process(input, &mut |_: Frame| calls += 1);

    assert_eq!(outcome, FrameOutcome::Dropped);
    assert_eq!(calls, 0);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(buffer.releases.load(Ordering::SeqCst), 0);
    let stats = gate.stats_snapshot();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.buffer_errors, 1);
}

#[test]
fn test_uncertain_retain_forwards_unprocessed() {
    let (seen, detector) = recording_detector(false);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();
    let buffer = CountingBuffer::i420();
    let input = frame_on(Arc::clone(&buffer), Rotation::None, 0);
    buffer.uncertain_retain.store(true, Ordering::SeqCst);

    let mut received = None;
    let outcome = gate.process(input.clone(), &mut |f: Frame| received = Some(f));

    assert_eq!(outcome, FrameOutcome::Unprocessed);
    assert!(Arc::ptr_eq(&received.unwrap().buffer, &input.buffer));
    assert!(buffer.balanced());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(gate.detection_state().counter, 0);
}

fn crashing_encoder(_: Frame) {
    panic!("encoder crashed");
}

#[test]
fn test_panicking_sink_still_releases() {
    let (_, detector) = recording_detector(true);
    let gate = FrameGate::new(&config(10), unlocked(), detector).unwrap();
    let buffer = CountingBuffer::i420();
    let input = frame_on(Arc::clone(&buffer), Rotation::None, 0);

    let result = catch_unwind(AssertUnwindSafe(|| {
        gate.process(input, &mut crashing_encoder);
    }));
    assert!(result.is_err());
    assert!(buffer.balanced());

    // Gate keeps working after the panic
    let mut calls = 0;
    gate.process(frame(1), &mut |_: Frame| calls += 1);
    assert_eq!(calls, 1);
}

#[test]
fn test_concurrent_callers_are_serialized() {
    let (seen, detector) = recording_detector(true);
    let gate = Arc::new(FrameGate::new(&config(10), unlocked(), detector).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                for i in 0..25 {
                    gate.process(frame(t * 100 + i), &mut |_: Frame| {});
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(seen.lock().unwrap().len(), 10);
    assert_eq!(gate.stats_snapshot().frames, 100);
    assert_eq!(gate.detection_state().counter, 0);
}

#[test]
fn test_camera_switch_between_frames() {
    let (_, detector) = recording_detector(true);
    let gate = Arc::new(FrameGate::new(&config(10), unlocked(), detector).unwrap());
    gate.process(frame(0), &mut |_: Frame| {});

    let control = Arc::clone(&gate);
    thread::spawn(move || control.set_active_camera("1"))
        .join()
        .unwrap();

    gate.process(frame(1), &mut |_: Frame| {});
    let state = gate.detection_state();
    assert_eq!(state.counter, 2);
    assert!(state.last);
}

#[test]
fn test_capture_loop_delivers_in_order() {
    let (seen, detector) = recording_detector(false);
    let gate = Arc::new(FrameGate::new(&config(4), unlocked(), detector).unwrap());
    let frames: Vec<Frame> = (0..12)
        .map(|i| {
            let buffer: Arc<dyn NativeBuffer> = SharedBuffer::new(vec![128u8; 8 * 8 * 4]);
            Frame::rgba(buffer, 8, 8, Rotation::None, i).unwrap()
        })
        .collect();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink_delivered = Arc::clone(&delivered);
    let mut controller = CaptureLoopController::start(
        "test-capture",
        frames.into_iter(),
        Arc::clone(&gate),
        move |frame: Frame| sink_delivered.lock().unwrap().push(frame.timestamp_ns),
    );
    controller.join();

    assert_eq!(*delivered.lock().unwrap(), (0..12).collect::<Vec<i64>>());
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert_eq!(gate.stats_snapshot().blurred, 12);
}

#[test]
fn test_padded_frame_without_face_is_blurred() {
    // 8 bytes of row padding on every plane
    let (luma_stride, chroma_stride) = (WIDTH + 8, WIDTH / 2 + 8);
    let luma_size = (luma_stride * HEIGHT) as usize;
    let chroma_size = (chroma_stride * HEIGHT / 2) as usize;
    let buffer: Arc<dyn NativeBuffer> =
        SharedBuffer::new(vec![120u8; luma_size + 2 * chroma_size]);
    let planes = vec![
        Plane::new(0, luma_stride, WIDTH, HEIGHT),
        Plane::new(luma_size, chroma_stride, WIDTH / 2, HEIGHT / 2),
        Plane::new(luma_size + chroma_size, chroma_stride, WIDTH / 2, HEIGHT / 2),
    ];
    let input = Frame::new(
        buffer,
        PixelFormat::I420,
        WIDTH,
        HEIGHT,
        planes,
        Rotation::None,
        0,
    )
    .unwrap();

    let (_, detector) = recording_detector(false);
    let gate = FrameGate::new(&config(1), unlocked(), detector).unwrap();
    let mut received = Vec::new();
    let outcome = gate.process(input.clone(), &mut |f: Frame| received.push(f));

    assert_eq!(outcome, FrameOutcome::Blurred);
    assert!(received[0].same_metadata(&input));
    assert_eq!(gate.stats_snapshot().blur_errors, 0);
}

#[test]
fn test_mismatched_planes_never_reach_the_gate() {
    // Chroma planes sized for a frame half as tall
    let buffer: Arc<dyn NativeBuffer> = SharedBuffer::new(vec![0u8; 4096]);
    let luma = (WIDTH * HEIGHT) as usize;
    let chroma = (WIDTH / 2 * HEIGHT / 4) as usize;
    let planes = vec![
        Plane::new(0, WIDTH, WIDTH, HEIGHT),
        Plane::new(luma, WIDTH / 2, WIDTH / 2, HEIGHT / 4),
        Plane::new(luma + chroma, WIDTH / 2, WIDTH / 2, HEIGHT / 4),
    ];
    let result = Frame::new(
        buffer,
        PixelFormat::I420,
        WIDTH,
        HEIGHT,
        planes,
        Rotation::None,
        0,
    );
    assert!(result.is_err());
}
