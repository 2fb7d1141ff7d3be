use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, Rgb, RgbImage};
use objscope::config::StreamConfig;
use objscope::detection::{DetectionAdapter, ModelHandle, ModelLoader, RawPrediction};
use objscope::driver::DriverEvent;
use objscope::source::{Frame, FrameSource};
use objscope::views::DetectionContext;
use tempfile::NamedTempFile;
use tokio::sync::{Semaphore, mpsc};

pub fn prediction(class: &str, score: f32, bbox: [f32; 4]) -> RawPrediction {
    RawPrediction {
        bbox,
        class: class.to_string(),
        score,
    }
}

/// cat 0.91, dog 0.80, cat 0.65
pub fn pets() -> Vec<RawPrediction> {
    vec![
        prediction("cat", 0.91, [10.0, 30.0, 40.0, 20.0]),
        prediction("dog", 0.80, [60.0, 40.0, 25.0, 30.0]),
        prediction("cat", 0.65, [5.0, 70.0, 30.0, 20.0]),
    ]
}

/// Plays back a script of outcomes, then repeats `fallback`.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Vec<RawPrediction>, String>>>,
    fallback: Vec<RawPrediction>,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn always(predictions: Vec<RawPrediction>) -> Self {
        Self::scripted(Vec::new(), predictions)
    }

    pub fn scripted(
        script: Vec<Result<Vec<RawPrediction>, String>>,
        fallback: Vec<RawPrediction>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelHandle for ScriptedModel {
    async fn detect(&self, _frame: &RgbImage) -> anyhow::Result<Vec<RawPrediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(predictions)) => Ok(predictions),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(self.fallback.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Blocks every detection until the test hands out a permit.
pub struct GatedModel {
    gate: Arc<Semaphore>,
    started: mpsc::UnboundedSender<()>,
    predictions: Vec<RawPrediction>,
}

pub struct Gate {
    gate: Arc<Semaphore>,
    started: mpsc::UnboundedReceiver<()>,
}

impl Gate {
    /// Wait until a detection is in flight.
    pub async fn wait_started(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.started.recv())
            .await
            .expect("detection never started")
            .expect("model dropped");
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

impl GatedModel {
    pub fn new(predictions: Vec<RawPrediction>) -> (Self, Gate) {
        let gate = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                gate: gate.clone(),
                started: tx,
                predictions,
            },
            Gate { gate, started: rx },
        )
    }
}

#[async_trait]
impl ModelHandle for GatedModel {
    async fn detect(&self, _frame: &RgbImage) -> anyhow::Result<Vec<RawPrediction>> {
        let _ = self.started.send(());
        self.gate.acquire().await?.forget();
        Ok(self.predictions.clone())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Hands out a ready model, optionally failing the first `failures` loads.
pub struct ReadyLoader {
    model: Arc<dyn ModelHandle>,
    failures: AtomicUsize,
    delay: Duration,
    pub loads: Arc<AtomicUsize>,
}

impl ReadyLoader {
    pub fn new(model: impl ModelHandle + 'static) -> Self {
        Self::shared(Arc::new(model))
    }

    pub fn shared(model: Arc<dyn ModelHandle>) -> Self {
        Self {
            model,
            failures: AtomicUsize::new(0),
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = AtomicUsize::new(failures);
        self
    }

    /// Every load takes `delay`, like fetching large weights.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ModelLoader for ReadyLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn ModelHandle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("model weights unreachable");
        }
        Ok(self.model.clone())
    }
}

pub fn adapter(model: impl ModelHandle + 'static) -> Arc<DetectionAdapter> {
    Arc::new(DetectionAdapter::new(ReadyLoader::new(model)))
}

/// A context whose driver ticks every millisecond.
pub fn context(adapter: Arc<DetectionAdapter>) -> DetectionContext {
    context_at_fps(adapter, StreamConfig::default().video_fps)
}

pub fn context_at_fps(adapter: Arc<DetectionAdapter>, video_fps: u32) -> DetectionContext {
    DetectionContext::new(adapter).with_stream(StreamConfig {
        frame_interval_ms: 1,
        video_fps,
        ..StreamConfig::default()
    })
}

pub fn solid_frame(width: u32, height: u32, shade: u8) -> Frame {
    Arc::new(ImageBuffer::from_pixel(width, height, Rgb([shade, shade, shade])))
}

/// In-memory frames, with optional open failure and per-call errors.
pub struct MemorySource {
    frames: VecDeque<Frame>,
    endless: Option<Frame>,
    open_error: Option<String>,
    fail_calls: Vec<usize>,
    calls: usize,
    pub closed: Arc<AtomicBool>,
}

impl MemorySource {
    pub fn frames(count: usize, width: u32, height: u32) -> Self {
        Self {
            frames: (0..count).map(|i| solid_frame(width, height, i as u8)).collect(),
            endless: None,
            open_error: None,
            fail_calls: Vec::new(),
            calls: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Never runs out, like a live camera.
    pub fn endless(width: u32, height: u32) -> Self {
        let mut source = Self::frames(0, width, height);
        source.endless = Some(solid_frame(width, height, 128));
        source
    }

    pub fn failing_open(message: &str) -> Self {
        let mut source = Self::frames(1, 4, 4);
        source.open_error = Some(message.to_string());
        source
    }

    /// Fail the `n`th call to `next_frame` (zero-based).
    pub fn with_error_at(mut self, n: usize) -> Self {
        self.fail_calls.push(n);
        self
    }

    pub fn boxed(self) -> Box<dyn FrameSource> {
        Box::new(self)
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn open(&mut self) -> anyhow::Result<()> {
        match &self.open_error {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    async fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_calls.contains(&call) {
            anyhow::bail!("corrupt frame");
        }
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.frames.pop_front().or_else(|| self.endless.clone()))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames
            .front()
            .or(self.endless.as_ref())
            .map(|f| f.dimensions())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "memory source".to_string()
    }
}

pub async fn next_event(rx: &mut mpsc::Receiver<DriverEvent>) -> DriverEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a driver event")
        .expect("driver event channel closed")
}

/// Nothing arrives within `wait`.
pub async fn assert_quiet(rx: &mut mpsc::Receiver<DriverEvent>, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected driver event: {event:?}");
    }
}

/// Creates a 100x100 red test image and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([255u8, 0u8, 0u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Writes `count` numbered PNG frames into a fresh directory.
pub fn create_frame_dir(count: usize, width: u32, height: u32) -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    for i in 0..count {
        ImageBuffer::from_pixel(width, height, Rgb([(i * 20 % 256) as u8, 0, 0]))
            .save(dir.path().join(format!("frame_{i:03}.png")))
            .expect("Failed to save frame");
    }
    dir
}
