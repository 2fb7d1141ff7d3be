use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub render: RenderConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of a YOLO-style detector.
    pub path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// One class name per line; the COCO names are used when unset.
    pub labels_path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            input_size: 640,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 20,
            labels_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub line_width: u32,
    pub label_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 14.0,
            line_width: 3,
            label_height: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between display frames; detection slower than this lowers the rate.
    pub frame_interval_ms: u64,
    /// Playback rate for directories of still frames.
    pub video_fps: u32,
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,
    pub event_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            video_fps: 25,
            camera_device: "/dev/video0".to_string(),
            camera_width: 640,
            camera_height: 480,
            camera_fps: 30,
            event_buffer: 16,
        }
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = Config::parse(
            r#"
            [model]
            path = "models/yolov8n.onnx"
            confidence_threshold = 0.3

            [stream]
            camera_device = "/dev/video2"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.model.path, Some(PathBuf::from("models/yolov8n.onnx")));
        assert_eq!(cfg.model.confidence_threshold, 0.3);
        assert_eq!(cfg.model.input_size, 640);
        assert_eq!(cfg.stream.camera_device, "/dev/video2");
        assert_eq!(cfg.stream.frame_interval_ms, 16);
        assert_eq!(cfg.render, RenderConfig::default());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(Config::parse("[render]\nline_width = \"thick\"").is_err());
    }

    #[test]
    fn load_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("objscope.toml");
        std::fs::write(&path, "[render]\nfont_size = 18.0\n")?;
        let cfg = Config::load_or_default(Some(&path))?;
        assert_eq!(cfg.render.font_size, 18.0);
        Ok(())
    }
}
