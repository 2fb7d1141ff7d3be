use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use tokio::sync::watch;

use super::{Frame, FrameSource};
use crate::config::StreamConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl From<&StreamConfig> for CameraSettings {
    fn from(cfg: &StreamConfig) -> Self {
        Self {
            device: cfg.camera_device.clone(),
            width: cfg.camera_width,
            height: cfg.camera_height,
            fps: cfg.camera_fps,
        }
    }
}

/// Live capture on its own thread, keeping only the newest frame.
/// Dropping the source stops the thread.
pub struct CameraSource {
    settings: CameraSettings,
    frames: Option<watch::Receiver<Option<Frame>>>,
    running: Arc<AtomicBool>,
    dims: Option<(u32, u32)>,
}

impl CameraSource {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            frames: None,
            running: Arc::new(AtomicBool::new(false)),
            dims: None,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl FrameSource for CameraSource {
    #[cfg(feature = "camera")]
    async fn open(&mut self) -> Result<()> {
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let (frame_tx, frame_rx) = watch::channel(None);
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        let settings = self.settings.clone();
        std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || capture::run(settings, ready_tx, frame_tx, running))?;

        let (w, h) = ready_rx
            .await
            .map_err(|_| anyhow!("camera thread exited before opening the device"))??;
        self.dims = Some((w, h));
        self.frames = Some(frame_rx);
        Ok(())
    }

    #[cfg(not(feature = "camera"))]
    async fn open(&mut self) -> Result<()> {
        Err(anyhow!(
            "camera capture is not available in this build (enable the `camera` feature) for {}",
            self.settings.device
        ))
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(frames) = self.frames.as_mut() else {
            return Ok(None);
        };
        // The sender goes away when the capture thread stops.
        if frames.changed().await.is_err() {
            return Ok(None);
        }
        Ok(frames.borrow_and_update().clone())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dims
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.frames = None;
    }

    fn describe(&self) -> String {
        format!("camera {}", self.settings.device)
    }
}

#[cfg(feature = "camera")]
mod capture {
    use super::*;
    use tokio::sync::oneshot;
    use tracing::{info, warn};
    use v4l::Device;
    use v4l::buffer::Type;
    use v4l::io::mmap::Stream;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;

    fn open_device(settings: &CameraSettings) -> Result<(Device, String, u32, u32)> {
        let dev = Device::with_path(&settings.device)
            .map_err(|e| anyhow!("cannot open {}: {e}", settings.device))?;

        let mut fmt = dev.format()?;
        fmt.fourcc = v4l::FourCC::new(b"MJPG");
        fmt.width = settings.width;
        fmt.height = settings.height;
        // The driver may substitute the closest supported format.
        let actual = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = settings.fps.max(1);
        let _ = dev.set_params(&params);

        let fourcc = actual
            .fourcc
            .str()
            .map_err(|_| anyhow!("camera reported an invalid pixel format"))?
            .to_string();
        Ok((dev, fourcc, actual.width, actual.height))
    }

    pub(super) fn run(
        settings: CameraSettings,
        ready: oneshot::Sender<Result<(u32, u32)>>,
        frames: watch::Sender<Option<Frame>>,
        running: Arc<AtomicBool>,
    ) {
        let (dev, fourcc, width, height) = match open_device(&settings) {
            Ok(opened) => opened,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let mut stream = match Stream::with_buffers(&dev, Type::VideoCapture, 4) {
            Ok(s) => s,
            Err(e) => {
                let _ = ready.send(Err(anyhow!("cannot start capture stream: {e}")));
                return;
            }
        };
        info!(device = %settings.device, %fourcc, width, height, "camera opened");
        if ready.send(Ok((width, height))).is_err() {
            return;
        }

        while running.load(Ordering::Relaxed) {
            let data = match stream.next() {
                Ok((data, _meta)) => data,
                Err(e) => {
                    warn!(device = %settings.device, "camera stream ended: {e}");
                    break;
                }
            };
            match decode_raw(&fourcc, data, width, height) {
                Ok(rgb) => {
                    if frames.send(Some(Arc::new(rgb))).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("dropping camera frame: {e:#}"),
            }
        }
        info!(device = %settings.device, "camera closed");
    }
}

/// Turn one captured buffer into RGB.
#[cfg_attr(not(feature = "camera"), allow(dead_code))]
fn decode_raw(fourcc: &str, data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    match fourcc {
        "MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()),
        "YUYV" => {
            let expected = (width * height * 2) as usize;
            if data.len() < expected {
                anyhow::bail!("short YUYV buffer: {} of {expected} bytes", data.len());
            }
            Ok(yuyv_to_rgb(data, width, height))
        }
        other => Err(anyhow!("unsupported camera pixel format {other}")),
    }
}

/// BT.601 YUYV 4:2:2, where each 4-byte group `[Y0 U Y1 V]` covers two pixels.
#[cfg_attr(not(feature = "camera"), allow(dead_code))]
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    let convert = |y: f32, u: f32, v: f32| {
        image::Rgb([
            (y + 1.402 * v).clamp(0.0, 255.0) as u8,
            (y - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8,
            (y + 1.772 * u).clamp(0.0, 255.0) as u8,
        ])
    };
    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let (y0, u, y1, v) = (
            chunk[0] as f32,
            chunk[1] as f32 - 128.0,
            chunk[2] as f32,
            chunk[3] as f32 - 128.0,
        );
        let idx = i as u32 * 2;
        let (x, y) = (idx % width, idx / width);
        if y >= height {
            break;
        }
        out.put_pixel(x, y, convert(y0, u, v));
        if x + 1 < width {
            out.put_pixel(x + 1, y, convert(y1, u, v));
        }
    }
    out
}
