pub mod camera;
pub mod image;
pub mod video;

use std::sync::Arc;

use ab_glyph::FontArc;
use anyhow::Result;
use ::image::RgbaImage;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{Config, StreamConfig};
use crate::detection::{DetectionAdapter, loader_for};
use crate::driver::{DriverEvent, DriverSettings, DriverState, Epoch, FrameDriver, FrameLoop};
use crate::error::{DetectError, DetectResult};
use crate::legend;
use crate::models::{ColorLegendEntry, DetailRow, DetectionBatch, DetectionStats};
use crate::render::{OverlayRenderer, RenderStyle, RgbaCanvas, composite, load_font};
use crate::source::{Frame, FrameSource, open_source};

pub use camera::CameraView;
pub use image::{ImageResult, ImageView, ImageViewState};
pub use video::VideoView;

/// Everything the statistics, legend and detail panels show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub stats: DetectionStats,
    pub legend: Vec<ColorLegendEntry>,
    pub details: Vec<DetailRow>,
}

impl ViewModel {
    pub fn from_batch(batch: &DetectionBatch, fps: Option<u32>) -> Self {
        let legend = legend::summarize(&batch.detections);
        let details = legend::detail_rows(&batch.detections, &legend);
        Self {
            stats: DetectionStats::from_batch(batch, fps),
            legend,
            details,
        }
    }
}

/// Shared services handed to every view.
#[derive(Clone)]
pub struct DetectionContext {
    pub adapter: Arc<DetectionAdapter>,
    pub renderer: OverlayRenderer,
    pub font: Option<FontArc>,
    pub font_size: f32,
    pub stream: StreamConfig,
}

impl DetectionContext {
    pub fn new(adapter: Arc<DetectionAdapter>) -> Self {
        Self {
            adapter,
            renderer: OverlayRenderer::default(),
            font: None,
            font_size: 14.0,
            stream: StreamConfig::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let font = match &config.render.font_path {
            Some(path) => Some(load_font(path)?),
            None => None,
        };
        Ok(Self {
            adapter: Arc::new(DetectionAdapter::from_boxed(loader_for(&config.model))),
            renderer: OverlayRenderer::new(RenderStyle::from(&config.render)),
            font,
            font_size: config.render.font_size,
            stream: config.stream.clone(),
        })
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn driver(&self) -> (FrameDriver, mpsc::Receiver<DriverEvent>) {
        let settings = DriverSettings::from_stream(&self.stream)
            .with_font(self.font.clone(), self.font_size);
        FrameDriver::new(self.adapter.clone(), self.renderer.clone(), settings)
    }

    /// Detect on a single frame and draw its overlay.
    pub async fn detect_still(&self, frame: Frame) -> DetectResult<ImageResult> {
        let batch = self.adapter.detect_batch(&frame).await?;
        let overlay = self.draw(&frame, &batch);
        Ok(ImageResult {
            view: ViewModel::from_batch(&batch, None),
            frame,
            overlay,
            batch,
        })
    }

    fn draw(&self, frame: &Frame, batch: &DetectionBatch) -> RgbaImage {
        let (width, height) = frame.dimensions();
        let mut canvas =
            RgbaCanvas::new(width, height).with_font(self.font.clone(), self.font_size);
        self.renderer
            .render(&mut canvas, &batch.detections, batch.source_width, batch.source_height);
        canvas.into_image()
    }
}

/// The next step after a play/start request.
pub enum PlayAction {
    /// Open this source, then pass it back to the view.
    Open(Box<dyn FrameSource>),
    /// Spawn this loop.
    Run(FrameLoop),
    /// Playback paused; nothing to run.
    Paused,
}

/// The latest frame shown by a streaming view.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    pub frame: Frame,
    pub overlay: RgbaImage,
    pub batch: DetectionBatch,
    pub fps: u32,
    pub view: ViewModel,
}

impl StreamFrame {
    pub fn annotated(&self) -> RgbaImage {
        composite(&self.frame, &self.overlay)
    }
}

/// Driver plus the state a streaming screen displays.
pub struct StreamView {
    driver: FrameDriver,
    events: Option<mpsc::Receiver<DriverEvent>>,
    latest: Option<StreamFrame>,
    error: Option<DetectError>,
    ended: bool,
    /// Epoch of the loop this view last started or resumed.
    session: Option<Epoch>,
}

impl StreamView {
    pub fn new(ctx: &DetectionContext) -> Self {
        let (driver, events) = ctx.driver();
        Self {
            driver,
            events: Some(events),
            latest: None,
            error: None,
            ended: false,
            session: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    pub fn latest(&self) -> Option<&StreamFrame> {
        self.latest.as_ref()
    }

    pub fn error(&self) -> Option<&DetectError> {
        self.error.as_ref()
    }

    /// True once the source reported that it ran out of frames.
    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn view_model(&self) -> ViewModel {
        self.latest
            .as_ref()
            .map(|l| l.view.clone())
            .unwrap_or_default()
    }

    pub fn session(&self) -> Option<Epoch> {
        self.session
    }

    /// Hand the event stream to a front end that polls it elsewhere.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>> {
        self.events.take()
    }

    /// Wait for the next driver event, if the stream was not taken.
    pub async fn next_event(&mut self) -> Option<DriverEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Fold a driver event into the view. Returns true when the display changed.
    pub fn apply(&mut self, event: DriverEvent) -> bool {
        match event {
            DriverEvent::Frame(output) => {
                if !self.driver.is_current(output.epoch) {
                    debug!(epoch = output.epoch.0, "ignoring frame from a stale epoch");
                    return false;
                }
                self.latest = Some(StreamFrame {
                    view: ViewModel::from_batch(&output.batch, Some(output.fps)),
                    frame: output.frame,
                    overlay: output.overlay,
                    batch: output.batch,
                    fps: output.fps,
                });
                true
            }
            DriverEvent::Ended { epoch } => {
                if !self.in_session(epoch) {
                    debug!(epoch = epoch.0, "ignoring end of an earlier session");
                    return false;
                }
                self.ended = true;
                true
            }
            DriverEvent::Failed { epoch, error } => {
                if !self.in_session(epoch) {
                    debug!(epoch = epoch.0, "ignoring failure of an earlier session");
                    return false;
                }
                self.error = Some(error);
                true
            }
        }
    }

    fn in_session(&self, epoch: Epoch) -> bool {
        self.session.is_some_and(|session| epoch >= session)
    }

    fn begin(&mut self, source: Box<dyn FrameSource>) -> DetectResult<PlayAction> {
        self.driver.begin_start()?;
        self.error = None;
        self.ended = false;
        Ok(PlayAction::Open(source))
    }

    pub fn source_opened(
        &mut self,
        result: Result<Box<dyn FrameSource>>,
    ) -> DetectResult<FrameLoop> {
        let result = self
            .driver
            .acquired(result.map_err(DetectError::acquisition));
        match &result {
            Ok(frame_loop) => self.session = Some(frame_loop.epoch()),
            Err(e @ DetectError::SourceAcquisition(_)) => self.error = Some(e.clone()),
            Err(_) => {}
        }
        result
    }

    /// Carry out `action` on the current runtime.
    pub async fn run(&mut self, action: PlayAction) -> DetectResult<()> {
        match action {
            PlayAction::Open(source) => {
                let opened = open_source(source).await;
                self.source_opened(opened)?.spawn();
            }
            PlayAction::Run(frame_loop) => {
                frame_loop.spawn();
            }
            PlayAction::Paused => {}
        }
        Ok(())
    }

    fn pause(&mut self) -> DetectResult<PlayAction> {
        self.driver.pause()?;
        Ok(PlayAction::Paused)
    }

    fn resume(&mut self) -> DetectResult<PlayAction> {
        let frame_loop = self.driver.resume()?;
        self.session = Some(frame_loop.epoch());
        Ok(PlayAction::Run(frame_loop))
    }

    pub fn stop(&mut self) {
        self.driver.stop();
    }

    /// Forget the displayed frame and any error.
    pub fn reset(&mut self) {
        self.latest = None;
        self.error = None;
        self.ended = false;
    }
}
