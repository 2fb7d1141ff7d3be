use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{DetectionContext, PlayAction, StreamView, ViewModel};
use crate::driver::{DriverEvent, DriverState, FrameLoop};
use crate::error::{DetectError, DetectResult};
use crate::source::{FrameSource, PlaybackMode, VideoSource};

pub struct VideoView {
    ctx: DetectionContext,
    stream: StreamView,
    path: Option<PathBuf>,
    mode: PlaybackMode,
}

impl VideoView {
    pub fn new(ctx: DetectionContext, mode: PlaybackMode) -> Self {
        Self {
            stream: StreamView::new(&ctx),
            ctx,
            path: None,
            mode,
        }
    }

    pub fn stream(&self) -> &StreamView {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut StreamView {
        &mut self.stream
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.stream.state() == DriverState::Running
    }

    pub fn view_model(&self) -> ViewModel {
        self.stream.view_model()
    }

    /// Select a new video. Any playback stops and earlier results are dropped.
    pub fn upload(&mut self, path: impl Into<PathBuf>) {
        self.stream.stop();
        self.stream.reset();
        self.path = Some(path.into());
    }

    /// Play when idle or stopped, pause when playing, resume when paused.
    pub fn toggle(&mut self) -> DetectResult<PlayAction> {
        match self.stream.state() {
            DriverState::Running => self.stream.pause(),
            DriverState::Paused => self.stream.resume(),
            DriverState::Idle | DriverState::Stopped => {
                let path = self
                    .path
                    .clone()
                    .ok_or_else(|| DetectError::acquisition("no video selected"))?;
                let source: Box<dyn FrameSource> =
                    Box::new(VideoSource::new(path, self.mode, self.ctx.stream.video_fps));
                self.stream.begin(source)
            }
            from @ DriverState::Starting => Err(DetectError::InvalidTransition {
                from,
                action: "toggle playback",
            }),
        }
    }

    pub fn source_opened(&mut self, result: Result<Box<dyn FrameSource>>) -> DetectResult<FrameLoop> {
        self.stream.source_opened(result)
    }

    /// `toggle` and carry the action out on the current runtime.
    pub async fn toggle_playback(&mut self) -> DetectResult<()> {
        let action = self.toggle()?;
        self.stream.run(action).await
    }

    pub fn apply(&mut self, event: DriverEvent) -> bool {
        self.stream.apply(event)
    }

    pub fn stop(&mut self) {
        self.stream.stop();
    }
}
