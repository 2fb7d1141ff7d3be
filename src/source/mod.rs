pub mod camera;
pub mod still;
pub mod video;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbImage;

pub use camera::{CameraSettings, CameraSource};
pub use still::StillSource;
pub use video::{PlaybackMode, VideoSource};

/// A decoded frame, shared between the detector, the renderer and views.
pub type Frame = Arc<RgbImage>;

/// Something that produces frames for detection: a still image, a video or a
/// camera stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Acquire the underlying media. Failing here means the source is unusable.
    async fn open(&mut self) -> Result<()>;

    /// The frame to process now, or `None` once no further frames will come.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Native pixel size, known after `open`.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Stop the playback clock, if the source has one.
    fn pause(&mut self) {}

    /// Restart the playback clock, if the source has one.
    fn resume(&mut self) {}

    /// Release the underlying media. Further calls to `next_frame` yield `None`.
    fn close(&mut self) {}

    fn describe(&self) -> String;
}

/// Open `source` and hand it back, ready for a frame driver.
pub async fn open_source(mut source: Box<dyn FrameSource>) -> Result<Box<dyn FrameSource>> {
    source
        .open()
        .await
        .with_context(|| format!("failed to open {}", source.describe()))?;
    Ok(source)
}

/// Decode an image file off the async runtime.
pub async fn decode_image(path: &Path) -> Result<RgbImage> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<RgbImage> {
        let img = image::ImageReader::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .with_guessed_format()?
            .decode()
            .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))?;
        Ok(img.to_rgb8())
    })
    .await
    .context("image decoding task panicked")?
}
