pub mod labels;
pub mod yolo;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::ModelConfig;
use crate::error::{DetectError, DetectResult};
use crate::models::{BoundingBox, Detection, DetectionBatch};

/// A prediction exactly as the model reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    /// `[x, y, width, height]` in source pixels.
    pub bbox: [f32; 4],
    pub class: String,
    pub score: f32,
}

/// A loaded, ready-to-run detection model.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    async fn detect(&self, frame: &RgbImage) -> anyhow::Result<Vec<RawPrediction>>;

    fn name(&self) -> &str;
}

/// Produces the model handle; called at most once per successful load.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn ModelHandle>>;
}

/// Wraps the external model: loads it lazily, once, and normalizes its output.
pub struct DetectionAdapter {
    loader: Box<dyn ModelLoader>,
    model: OnceCell<Arc<dyn ModelHandle>>,
}

impl DetectionAdapter {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self::from_boxed(Box::new(loader))
    }

    pub fn from_boxed(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    /// Return the cached handle, loading it on first use.
    ///
    /// Concurrent callers share one in-flight load. A failed load leaves the
    /// cell empty so a later explicit call can try again.
    pub async fn ensure_model_ready(&self) -> DetectResult<Arc<dyn ModelHandle>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                info!("Loading object detection model...");
                let started = Instant::now();
                match self.loader.load().await {
                    Ok(model) => {
                        info!(
                            model = model.name(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Model loaded"
                        );
                        Ok(model)
                    }
                    Err(e) => {
                        error!("Failed to load model: {e:#}");
                        Err(DetectError::model_load(e))
                    }
                }
            })
            .await?;
        Ok(model.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.model.initialized()
    }

    /// Run the model on `frame`, keeping its order and `x, y, w, h` boxes.
    pub async fn detect(&self, frame: &RgbImage) -> DetectResult<Vec<Detection>> {
        let model = self.ensure_model_ready().await?;
        let predictions = model.detect(frame).await.map_err(DetectError::frame)?;
        Ok(predictions
            .into_iter()
            .map(|p| Detection::new(BoundingBox::from_xywh(p.bbox), p.class, p.score))
            .collect())
    }

    /// `detect` plus timing and source dimensions.
    pub async fn detect_batch(&self, frame: &RgbImage) -> DetectResult<DetectionBatch> {
        // Make sure the first-frame load time is not reported as inference time.
        self.ensure_model_ready().await?;
        let started = Instant::now();
        let detections = self.detect(frame).await?;
        Ok(DetectionBatch {
            detections,
            elapsed_millis: (started.elapsed().as_secs_f64() * 1000.0).round() as u64,
            source_width: frame.width(),
            source_height: frame.height(),
        })
    }
}

/// Loader used when no model backend was compiled in.
pub struct UnavailableLoader {
    reason: String,
}

impl UnavailableLoader {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ModelLoader for UnavailableLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn ModelHandle>> {
        anyhow::bail!("{}", self.reason)
    }
}

/// Pick the model backend for `cfg`.
pub fn loader_for(cfg: &ModelConfig) -> Box<dyn ModelLoader> {
    #[cfg(feature = "onnx")]
    {
        match &cfg.path {
            Some(path) => Box::new(onnx::OnnxLoader::new(path.clone(), cfg.clone())),
            None => Box::new(UnavailableLoader::new(
                "no model configured; pass --model or set [model].path",
            )),
        }
    }
    #[cfg(not(feature = "onnx"))]
    {
        let _ = cfg;
        Box::new(UnavailableLoader::new(
            "objscope was built without a model backend; rebuild with --features onnx",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedModel;

    #[async_trait]
    impl ModelHandle for FixedModel {
        async fn detect(&self, _frame: &RgbImage) -> anyhow::Result<Vec<RawPrediction>> {
            Ok(vec![
                RawPrediction {
                    bbox: [5.0, 6.0, 7.0, 8.0],
                    class: "dog".into(),
                    score: 0.8,
                },
                RawPrediction {
                    bbox: [1.0, 2.0, 3.0, 4.0],
                    class: "cat".into(),
                    score: 0.9,
                },
            ])
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self) -> anyhow::Result<Arc<dyn ModelHandle>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                anyhow::bail!("network unreachable");
            }
            Ok(Arc::new(FixedModel))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let adapter = Arc::new(DetectionAdapter::new(CountingLoader {
            loads: loads.clone(),
            fail: false,
        }));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let adapter = adapter.clone();
            handles.push(tokio::spawn(async move {
                adapter.ensure_model_ready().await.map(|m| m.name().to_string())
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "fixed");
        }
        adapter.ensure_model_ready().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn load_failure_is_surfaced_and_not_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let adapter = DetectionAdapter::new(CountingLoader {
            loads: loads.clone(),
            fail: true,
        });

        let err = adapter.ensure_model_ready().await.err().unwrap();
        assert!(matches!(err, DetectError::ModelLoad(ref msg) if msg.contains("network")));
        assert!(err.is_fatal());
        assert!(!adapter.is_ready());

        let frame = RgbImage::new(4, 4);
        assert!(matches!(
            adapter.detect(&frame).await,
            Err(DetectError::ModelLoad(_))
        ));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detect_preserves_order_and_coordinates() {
        let adapter = DetectionAdapter::new(CountingLoader {
            loads: Arc::new(AtomicUsize::new(0)),
            fail: false,
        });
        let batch = adapter.detect_batch(&RgbImage::new(64, 48)).await.unwrap();

        assert_eq!(batch.source_width, 64);
        assert_eq!(batch.source_height, 48);
        assert_eq!(batch.detections[0].label, "dog");
        assert_eq!(batch.detections[0].bbox, BoundingBox::new(5.0, 6.0, 7.0, 8.0));
        assert_eq!(batch.detections[1].label, "cat");
        assert_eq!(batch.detections[1].confidence, 0.9);
    }

    #[tokio::test]
    async fn unavailable_loader_reports_model_load() {
        let adapter = DetectionAdapter::new(UnavailableLoader::new("no backend"));
        let err = adapter.ensure_model_ready().await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "failed to load the object detection model: no backend"
        );
    }
}
