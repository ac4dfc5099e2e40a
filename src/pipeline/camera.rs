use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::rgba_converter;
use crate::{error::AppError, types::Frame};

/// Consecutive read/decode failures after which the stream is considered dead.
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

/// A device that can be opened into a live frame stream.
pub trait CaptureSource {
    type Stream: FrameStream;

    fn is_available(&self) -> bool;
    fn acquire(&mut self) -> Result<Self::Stream, AppError>;
    fn release(&mut self, stream: Self::Stream);
}

pub trait FrameStream {
    /// Most recent frame, without queueing. `Ok(None)` until the first frame
    /// arrives; `Err` once the stream has failed for good.
    fn latest_frame(&mut self) -> Result<Option<Frame>, String>;
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

/// Picks the configured camera, or the first one the host reports.
pub fn select_camera(preferred: Option<u32>) -> Option<CameraDevice> {
    let cameras = match available_cameras() {
        Ok(cameras) => cameras,
        Err(err) => {
            log::error!("failed to enumerate cameras: {err:?}");
            return None;
        }
    };

    match preferred {
        Some(wanted) => {
            let found = cameras
                .iter()
                .find(|c| matches!(c.index, CameraIndex::Index(idx) if idx == wanted))
                .cloned();
            if found.is_none() {
                log::warn!("camera {wanted} not found, falling back to the first camera");
            }
            found.or_else(|| cameras.into_iter().next())
        }
        None => cameras.into_iter().next(),
    }
}

pub struct NokhwaCapture {
    device: Option<CameraDevice>,
}

impl NokhwaCapture {
    pub fn new(device: Option<CameraDevice>) -> Self {
        if let Some(device) = &device {
            log::info!("using camera {}", device.label);
        } else {
            log::warn!("no camera available on this host");
        }
        Self { device }
    }
}

impl CaptureSource for NokhwaCapture {
    type Stream = CameraStream;

    fn is_available(&self) -> bool {
        self.device.is_some()
    }

    fn acquire(&mut self) -> Result<CameraStream, AppError> {
        let Some(device) = &self.device else {
            return Err(AppError::Acquisition("no camera available".to_string()));
        };
        start_camera_stream(device.index.clone())
            .map_err(|err| AppError::Acquisition(format!("{err:#}")))
    }

    fn release(&mut self, stream: CameraStream) {
        stream.stop();
    }
}

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Live stream backed by a capture thread. Frames flow through a single-slot
/// channel: the thread drops frames while the slot is full.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    frame_rx: Receiver<Frame>,
    failure_rx: Receiver<String>,
    current: Option<Frame>,
    failure: Option<String>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::info!("camera stream released");
        }
    }

    fn from_channels(frame_rx: Receiver<Frame>, failure_rx: Receiver<String>) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            frame_rx,
            failure_rx,
            current: None,
            failure: None,
        }
    }
}

impl FrameStream for CameraStream {
    fn latest_frame(&mut self) -> Result<Option<Frame>, String> {
        if self.failure.is_none() {
            if let Ok(reason) = self.failure_rx.try_recv() {
                self.failure = Some(reason);
            }
        }
        if let Some(reason) = &self.failure {
            return Err(reason.clone());
        }

        loop {
            match self.frame_rx.try_recv() {
                Ok(frame) => self.current = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.current.is_none() {
                        let reason = "camera stream ended before delivering a frame".to_string();
                        self.failure = Some(reason.clone());
                        return Err(reason);
                    }
                    break;
                }
            }
        }

        Ok(self.current.clone())
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_camera_stream(index: CameraIndex) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    drop(build_camera(index.clone())?);

    let (frame_tx, frame_rx) = bounded(1);
    let (failure_tx, failure_rx) = bounded(1);
    let mut stream = CameraStream::from_channels(frame_rx, failure_rx);
    let stop_flag = stream.stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                let _ = failure_tx.try_send(format!("failed to open camera: {err:#}"));
                return;
            }
        };
        log::info!("camera opened: {:?}", camera.camera_format());

        capture_loop(&stop_flag, &frame_tx, &failure_tx, || {
            let frame = camera
                .frame()
                .map_err(|err| anyhow!("camera frame read failed: {err}"))?;
            rgba_converter::convert_camera_frame(&frame)
        });
    });

    stream.handle = Some(handle);
    Ok(stream)
}

fn capture_loop<F>(
    stop: &AtomicBool,
    frame_tx: &Sender<Frame>,
    failure_tx: &Sender<String>,
    mut next_frame: F,
) where
    F: FnMut() -> Result<rgba_converter::RgbaFrame>,
{
    let mut consecutive_failures = 0u32;

    while !stop.load(Ordering::Relaxed) {
        let converted = match next_frame() {
            Ok(converted) => {
                consecutive_failures = 0;
                converted
            }
            Err(err) => {
                consecutive_failures += 1;
                log::warn!("camera frame dropped ({consecutive_failures} in a row): {err:?}");
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    log::error!("camera stopped delivering frames");
                    let _ = failure_tx.try_send(format!("camera stopped delivering frames: {err:#}"));
                    return;
                }
                continue;
            }
        };

        let frame = Frame {
            rgba: converted.rgba,
            width: converted.width,
            height: converted.height,
            timestamp: Instant::now(),
        };

        // Drop if the consumer hasn't picked up the previous frame yet.
        let _ = frame_tx.try_send(frame);
    }
}
