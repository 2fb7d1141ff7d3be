use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use super::labels::{coco_labels, load_labels};
use super::yolo::{self, YoloParams};
use super::{ModelHandle, ModelLoader, RawPrediction};
use crate::config::ModelConfig;

/// Loads a YOLO ONNX export with ONNX Runtime.
pub struct OnnxLoader {
    path: PathBuf,
    cfg: ModelConfig,
}

impl OnnxLoader {
    pub fn new(path: PathBuf, cfg: ModelConfig) -> Self {
        Self { path, cfg }
    }
}

#[async_trait]
impl ModelLoader for OnnxLoader {
    async fn load(&self) -> Result<Arc<dyn ModelHandle>> {
        let path = self.path.clone();
        let cfg = self.cfg.clone();
        let model = tokio::task::spawn_blocking(move || OnnxModel::load(path, &cfg))
            .await
            .context("model loading task panicked")??;
        Ok(Arc::new(model))
    }
}

pub struct OnnxModel {
    name: String,
    session: Arc<Mutex<Session>>,
    labels: Arc<Vec<String>>,
    params: YoloParams,
}

impl OnnxModel {
    pub fn load(path: PathBuf, cfg: &ModelConfig) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("model file not found: {}", path.display());
        }
        let session = Session::builder()
            .context("failed to create ORT session builder")?
            .with_intra_threads(4)
            .context("failed to set ORT intra threads")?
            .commit_from_file(&path)
            .with_context(|| format!("failed to load ONNX model {}", path.display()))?;

        let labels = match &cfg.labels_path {
            Some(p) => load_labels(p)?,
            None => coco_labels(),
        };

        Ok(Self {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "onnx".to_string()),
            session: Arc::new(Mutex::new(session)),
            labels: Arc::new(labels),
            params: YoloParams::from(cfg),
        })
    }
}

fn infer(
    session: &Mutex<Session>,
    frame: &RgbImage,
    params: &YoloParams,
    labels: &[String],
) -> Result<Vec<RawPrediction>> {
    let size = params.input_size as usize;
    let input = yolo::preprocess(frame, params.input_size);
    let tensor = Tensor::from_array(([1usize, 3, size, size], input.into_boxed_slice()))
        .context("failed to create YOLO input tensor")?;

    let mut session = session
        .lock()
        .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
    let outputs = session
        .run(ort::inputs![tensor])
        .context("YOLO inference failed")?;

    let output = outputs
        .iter()
        .next()
        .context("model produced no outputs")?
        .1;
    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .context("failed to extract YOLO output tensor")?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!(?dims, "decoded output tensor");

    Ok(yolo::decode(
        data,
        &dims,
        params,
        labels,
        frame.width(),
        frame.height(),
    ))
}

#[async_trait]
impl ModelHandle for OnnxModel {
    async fn detect(&self, frame: &RgbImage) -> Result<Vec<RawPrediction>> {
        let session = self.session.clone();
        let labels = self.labels.clone();
        let params = self.params;
        let frame = frame.clone();
        tokio::task::spawn_blocking(move || infer(&session, &frame, &params, &labels))
            .await
            .context("inference task panicked")?
    }

    fn name(&self) -> &str {
        &self.name
    }
}
