use anyhow::Result;

use super::{DetectionContext, PlayAction, StreamView, ViewModel};
use crate::driver::{DriverEvent, FrameLoop};
use crate::error::DetectResult;
use crate::source::{CameraSettings, CameraSource, FrameSource};

pub struct CameraView {
    stream: StreamView,
    settings: CameraSettings,
}

impl CameraView {
    pub fn new(ctx: DetectionContext) -> Self {
        Self {
            settings: CameraSettings::from(&ctx.stream),
            stream: StreamView::new(&ctx),
        }
    }

    pub fn with_settings(mut self, settings: CameraSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn stream(&self) -> &StreamView {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut StreamView {
        &mut self.stream
    }

    pub fn is_active(&self) -> bool {
        self.stream.state().is_active()
    }

    pub fn view_model(&self) -> ViewModel {
        self.stream.view_model()
    }

    /// Ask for the camera. The returned action opens it.
    pub fn start_camera(&mut self) -> DetectResult<PlayAction> {
        self.start_with(Box::new(CameraSource::new(self.settings.clone())))
    }

    /// Start on any live source, such as a prerecorded stand-in for the device.
    pub fn start_with(&mut self, source: Box<dyn FrameSource>) -> DetectResult<PlayAction> {
        self.stream.reset();
        self.stream.begin(source)
    }

    /// Denied or missing devices leave the view idle with the error shown inline.
    pub fn camera_opened(&mut self, result: Result<Box<dyn FrameSource>>) -> DetectResult<FrameLoop> {
        self.stream.source_opened(result)
    }

    pub async fn start(&mut self) -> DetectResult<()> {
        let action = self.start_camera()?;
        self.stream.run(action).await
    }

    /// Release the camera and clear the results and frame rate.
    pub fn stop_camera(&mut self) {
        self.stream.stop();
        self.stream.reset();
    }

    pub fn apply(&mut self, event: DriverEvent) -> bool {
        self.stream.apply(event)
    }
}
