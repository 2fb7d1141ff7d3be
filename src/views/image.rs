use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::image::{RgbImage, RgbaImage};
use tracing::info;

use super::{DetectionContext, ViewModel};
use crate::error::{DetectError, DetectResult};
use crate::models::DetectionBatch;
use crate::render::composite;
use crate::source::{Frame, FrameSource, StillSource};

/// Outcome of detecting on one still image.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub frame: Frame,
    pub overlay: RgbaImage,
    pub batch: DetectionBatch,
    pub view: ViewModel,
}

impl ImageResult {
    /// The image with its overlay blended on top.
    pub fn annotated(&self) -> RgbaImage {
        composite(&self.frame, &self.overlay)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ImageViewState<'a> {
    Empty,
    Ready(&'a ImageResult),
    Failed(&'a DetectError),
}

pub struct ImageView {
    ctx: DetectionContext,
    path: Option<PathBuf>,
    result: Option<ImageResult>,
    error: Option<DetectError>,
}

impl ImageView {
    pub fn new(ctx: DetectionContext) -> Self {
        Self {
            ctx,
            path: None,
            result: None,
            error: None,
        }
    }

    pub fn state(&self) -> ImageViewState<'_> {
        match (&self.result, &self.error) {
            (_, Some(error)) => ImageViewState::Failed(error),
            (Some(result), None) => ImageViewState::Ready(result),
            (None, None) => ImageViewState::Empty,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn result(&self) -> Option<&ImageResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&DetectError> {
        self.error.as_ref()
    }

    pub fn view_model(&self) -> ViewModel {
        self.result().map(|r| r.view.clone()).unwrap_or_default()
    }

    /// Load `path` and detect on it.
    pub async fn open(&mut self, path: impl Into<PathBuf>) -> DetectResult<&ImageResult> {
        let path = path.into();
        self.select(path.clone());
        let frame = match load_still(&path).await {
            Ok(frame) => frame,
            Err(e) => {
                self.error = Some(e.clone());
                return Err(e);
            }
        };
        let result = self.ctx.detect_still(frame).await;
        self.apply_result(result)
    }

    pub async fn detect_image(&mut self, image: RgbImage) -> DetectResult<&ImageResult> {
        let result = self.ctx.detect_still(Arc::new(image)).await;
        self.apply_result(result)
    }

    /// Record a newly chosen file; earlier results no longer apply.
    pub fn select(&mut self, path: PathBuf) {
        self.path = Some(path);
        self.result = None;
        self.error = None;
    }

    /// Store the outcome of a detection run elsewhere.
    pub fn apply_result(
        &mut self,
        result: DetectResult<ImageResult>,
    ) -> DetectResult<&ImageResult> {
        match result {
            Ok(result) => {
                info!(
                    objects = result.batch.len(),
                    elapsed_ms = result.batch.elapsed_millis,
                    "image processed"
                );
                self.error = None;
                Ok(self.result.insert(result))
            }
            Err(e) => {
                self.result = None;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn clear(&mut self) {
        self.path = None;
        self.result = None;
        self.error = None;
    }
}

/// Decode a still image as a frame, reporting failures as acquisition errors.
pub async fn load_still(path: &Path) -> DetectResult<Frame> {
    let mut source = StillSource::from_path(path);
    source.open().await.map_err(DetectError::acquisition)?;
    source
        .next_frame()
        .await
        .map_err(DetectError::acquisition)?
        .ok_or_else(|| DetectError::acquisition(format!("{} has no image", path.display())))
}
