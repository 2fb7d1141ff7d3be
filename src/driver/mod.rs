pub mod fps;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use ab_glyph::FontArc;
use image::RgbaImage;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::detection::DetectionAdapter;
use crate::error::{DetectError, DetectResult};
use crate::models::DetectionBatch;
use crate::render::{OverlayRenderer, RgbaCanvas};
use crate::source::{Frame, FrameSource};

pub use fps::FpsMeter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    /// Waiting for the media source to be acquired.
    Starting,
    Running,
    Paused,
    Stopped,
}

impl DriverState {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            DriverState::Starting | DriverState::Running | DriverState::Paused
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

/// One processed frame, ready to display.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub epoch: Epoch,
    pub frame: Frame,
    /// Transparent overlay the size of the frame.
    pub overlay: RgbaImage,
    pub batch: DetectionBatch,
    pub fps: u32,
}

#[derive(Debug, Clone)]
pub enum DriverEvent {
    Frame(FrameOutput),
    /// The source ran out of frames; the driver is now `Stopped`.
    Ended { epoch: Epoch },
    /// The model could not be loaded; the driver is now `Stopped`.
    Failed { epoch: Epoch, error: DetectError },
}

#[derive(Clone)]
pub struct DriverSettings {
    pub frame_interval: Duration,
    pub event_buffer: usize,
    pub font: Option<FontArc>,
    pub font_size: f32,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_stream(&StreamConfig::default())
    }
}

impl DriverSettings {
    pub fn from_stream(cfg: &StreamConfig) -> Self {
        Self {
            frame_interval: cfg.frame_interval(),
            event_buffer: cfg.event_buffer.max(1),
            font: None,
            font_size: 14.0,
        }
    }

    pub fn with_font(mut self, font: Option<FontArc>, font_size: f32) -> Self {
        self.font = font;
        self.font_size = font_size;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }
}

type SharedSource = Arc<tokio::sync::Mutex<Box<dyn FrameSource>>>;

/// State shared between a driver and the loops it spawned.
struct Shared {
    state: Mutex<DriverState>,
    epoch: watch::Sender<u64>,
}

impl Shared {
    fn new() -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            state: Mutex::new(DriverState::Idle),
            epoch,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        // The guarded value is a plain enum, valid even after a panic.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> DriverState {
        *self.lock()
    }

    fn epoch(&self) -> Epoch {
        Epoch(*self.epoch.borrow())
    }

    fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch() == epoch
    }

    fn advance(&self) -> Epoch {
        self.epoch.send_modify(|e| *e += 1);
        self.epoch()
    }

    /// Move `allowed -> to`; leaving `Running` always advances the epoch.
    fn transition(
        &self,
        allowed: &[DriverState],
        to: DriverState,
        action: &'static str,
    ) -> DetectResult<DriverState> {
        let mut state = self.lock();
        let from = *state;
        if !allowed.contains(&from) {
            return Err(DetectError::InvalidTransition { from, action });
        }
        *state = to;
        if from == DriverState::Running || to == DriverState::Running {
            self.advance();
        }
        debug!(?from, ?to, epoch = self.epoch().0, "driver transition");
        Ok(from)
    }

    /// Stop on behalf of the loop running under `epoch`. Returns false when
    /// that loop was already superseded.
    fn finish(&self, epoch: Epoch) -> bool {
        let mut state = self.lock();
        if *state != DriverState::Running || !self.is_current(epoch) {
            return false;
        }
        *state = DriverState::Stopped;
        self.advance();
        true
    }
}

/// Playback state machine for one view's streaming source.
///
/// Every transition out of `Running` bumps the epoch, which cancels the
/// loop's next tick and marks a detection still in flight as stale.
pub struct FrameDriver {
    adapter: Arc<DetectionAdapter>,
    renderer: OverlayRenderer,
    settings: DriverSettings,
    shared: Arc<Shared>,
    source: Option<SharedSource>,
    events: mpsc::Sender<DriverEvent>,
    last_error: Option<DetectError>,
}

impl FrameDriver {
    pub fn new(
        adapter: Arc<DetectionAdapter>,
        renderer: OverlayRenderer,
        settings: DriverSettings,
    ) -> (Self, mpsc::Receiver<DriverEvent>) {
        let (events, rx) = mpsc::channel(settings.event_buffer.max(1));
        let driver = Self {
            adapter,
            renderer,
            settings,
            shared: Arc::new(Shared::new()),
            source: None,
            events,
            last_error: None,
        };
        (driver, rx)
    }

    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    /// The current generation; results tagged with any other epoch are stale.
    pub fn epoch(&self) -> Epoch {
        self.shared.epoch()
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.shared.is_current(epoch)
    }

    /// The acquisition error of the most recent failed start.
    pub fn last_error(&self) -> Option<&DetectError> {
        self.last_error.as_ref()
    }

    /// First half of a start: `Idle | Stopped -> Starting`.
    pub fn begin_start(&mut self) -> DetectResult<()> {
        self.shared.transition(
            &[DriverState::Idle, DriverState::Stopped],
            DriverState::Starting,
            "start",
        )?;
        self.last_error = None;
        Ok(())
    }

    /// Second half of a start, with the outcome of opening the source.
    ///
    /// On success the driver is `Running` and the returned loop must be
    /// spawned. On failure it falls back to `Idle` and no loop exists.
    pub fn acquired(
        &mut self,
        result: DetectResult<Box<dyn FrameSource>>,
    ) -> DetectResult<FrameLoop> {
        match result {
            Ok(mut source) => {
                if let Err(e) =
                    self.shared
                        .transition(&[DriverState::Starting], DriverState::Running, "run")
                {
                    // Stopped while the source was being acquired.
                    source.close();
                    return Err(e);
                }
                info!(source = %source.describe(), epoch = self.epoch().0, "playback started");
                self.source = Some(Arc::new(tokio::sync::Mutex::new(source)));
                self.make_loop()
            }
            Err(err) => {
                warn!("source acquisition failed: {err}");
                let mut state = self.shared.lock();
                if *state == DriverState::Starting {
                    *state = DriverState::Idle;
                }
                drop(state);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Open `source` and start playing it.
    pub async fn start(&mut self, mut source: Box<dyn FrameSource>) -> DetectResult<FrameLoop> {
        self.begin_start()?;
        let opened = match source.open().await {
            Ok(()) => Ok(source),
            Err(e) => Err(DetectError::acquisition(e)),
        };
        self.acquired(opened)
    }

    pub fn pause(&mut self) -> DetectResult<()> {
        self.shared
            .transition(&[DriverState::Running], DriverState::Paused, "pause")?;
        Ok(())
    }

    /// `Paused -> Running` over the same source; spawn the returned loop.
    pub fn resume(&mut self) -> DetectResult<FrameLoop> {
        self.shared
            .transition(&[DriverState::Paused], DriverState::Running, "resume")?;
        self.make_loop()
    }

    /// Stop playback and release the source. A no-op when nothing is active.
    pub fn stop(&mut self) {
        let mut state = self.shared.lock();
        if !state.is_active() {
            return;
        }
        let from = *state;
        *state = DriverState::Stopped;
        self.shared.advance();
        drop(state);
        debug!(?from, epoch = self.epoch().0, "driver stopped");

        if let Some(source) = self.source.take() {
            // A loop holding the source closes it on its way out.
            if let Ok(mut source) = source.try_lock() {
                source.close();
            }
        }
    }

    fn make_loop(&self) -> DetectResult<FrameLoop> {
        let source = self.source.clone().ok_or(DetectError::InvalidTransition {
            from: self.state(),
            action: "run without a source",
        })?;
        Ok(FrameLoop {
            epoch: self.shared.epoch(),
            epoch_rx: self.shared.epoch.subscribe(),
            shared: self.shared.clone(),
            source,
            adapter: self.adapter.clone(),
            renderer: self.renderer.clone(),
            settings: self.settings.clone(),
            events: self.events.clone(),
        })
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        // Cancel whatever loop is still scheduled.
        self.shared.advance();
    }
}

/// The scheduled work of one `Running` period.
pub struct FrameLoop {
    epoch: Epoch,
    epoch_rx: watch::Receiver<u64>,
    shared: Arc<Shared>,
    source: SharedSource,
    adapter: Arc<DetectionAdapter>,
    renderer: OverlayRenderer,
    settings: DriverSettings,
    events: mpsc::Sender<DriverEvent>,
}

impl FrameLoop {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run ticks until the epoch moves on, the source ends or the model fails.
    pub async fn run(mut self) {
        let epoch = self.epoch;
        let mut ticker = tokio::time::interval(self.settings.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut fps = FpsMeter::new(Instant::now());

        // Load before resuming so a realtime clip's clock does not run during the load.
        let ready = self.model_ready(epoch).await;
        if ready {
            self.source.lock().await.resume();
        }

        while ready {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.epoch_rx.changed() => {}
            }
            if !self.shared.is_current(epoch) {
                break;
            }

            let next = {
                let mut source = self.source.lock().await;
                tokio::select! {
                    next = source.next_frame() => next,
                    _ = self.epoch_rx.changed() => break,
                }
            };
            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if self.shared.finish(epoch) {
                        info!(epoch = epoch.0, "source ended");
                        let _ = self.events.send(DriverEvent::Ended { epoch }).await;
                    }
                    break;
                }
                Err(e) => {
                    warn!(epoch = epoch.0, "skipping frame: {e:#}");
                    continue;
                }
            };

            let batch = match self.adapter.detect_batch(&frame).await {
                Ok(batch) => batch,
                Err(error) if error.is_fatal() => {
                    if self.shared.finish(epoch) {
                        let _ = self.events.send(DriverEvent::Failed { epoch, error }).await;
                    }
                    break;
                }
                Err(e) => {
                    warn!(epoch = epoch.0, "skipping frame: {e}");
                    continue;
                }
            };

            if !self.shared.is_current(epoch) {
                debug!(epoch = epoch.0, "discarding stale detection result");
                break;
            }

            let overlay = self.draw(&frame, &batch);
            let output = FrameOutput {
                epoch,
                frame,
                overlay,
                batch,
                fps: fps.tick(Instant::now()),
            };
            if self.events.send(DriverEvent::Frame(output)).await.is_err() {
                debug!(epoch = epoch.0, "event receiver dropped, stopping loop");
                break;
            }
        }

        // Read the state under the lock so a loop resumed meanwhile keeps its source running.
        let mut source = self.source.lock().await;
        match self.shared.state() {
            DriverState::Paused => source.pause(),
            DriverState::Stopped | DriverState::Idle => source.close(),
            _ => {}
        }
    }

    /// False when the load failed or the loop was superseded while waiting.
    async fn model_ready(&mut self, epoch: Epoch) -> bool {
        let ready = tokio::select! {
            ready = self.adapter.ensure_model_ready() => ready,
            _ = self.epoch_rx.changed() => return false,
        };
        match ready {
            Ok(_) => true,
            Err(error) => {
                if self.shared.finish(epoch) {
                    let _ = self.events.send(DriverEvent::Failed { epoch, error }).await;
                }
                false
            }
        }
    }

    fn draw(&self, frame: &Frame, batch: &DetectionBatch) -> RgbaImage {
        let (width, height) = frame.dimensions();
        let mut canvas = RgbaCanvas::new(width, height)
            .with_font(self.settings.font.clone(), self.settings.font_size);
        self.renderer.render(
            &mut canvas,
            &batch.detections,
            batch.source_width,
            batch.source_height,
        );
        canvas.into_image()
    }
}
