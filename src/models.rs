use serde::{Deserialize, Serialize};

use crate::render::palette::PaletteColor;

/// Axis-aligned box in source-media pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from the `[x, y, width, height]` order used by model output.
    pub fn from_xywh(xywh: [f32; 4]) -> Self {
        Self::new(xywh[0], xywh[1], xywh[2], xywh[3])
    }

    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x: self.x * scale_x,
            y: self.y * scale_y,
            width: self.width * scale_x,
            height: self.height * scale_y,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// One predicted object instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    /// Confidence as a rounded percentage.
    pub fn confidence_pct(&self) -> u32 {
        to_pct(self.confidence)
    }

    /// Text drawn above the box, e.g. `cat (91%)`.
    pub fn caption(&self) -> String {
        format!("{} ({}%)", self.label, self.confidence_pct())
    }
}

/// Result of one inference call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub elapsed_millis: u64,
    pub source_width: u32,
    pub source_height: u32,
}

impl DetectionBatch {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorLegendEntry {
    pub label: String,
    pub color: PaletteColor,
    pub count: usize,
}

/// Figures shown in a view's statistics panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub object_count: usize,
    pub average_confidence_pct: u32,
    pub processing_millis: u64,
    /// Only reported by streaming sources.
    pub fps: Option<u32>,
    pub source_width: u32,
    pub source_height: u32,
}

impl DetectionStats {
    pub fn from_batch(batch: &DetectionBatch, fps: Option<u32>) -> Self {
        let average = if batch.is_empty() {
            0.0
        } else {
            batch.detections.iter().map(|d| d.confidence).sum::<f32>() / batch.len() as f32
        };
        Self {
            object_count: batch.len(),
            average_confidence_pct: to_pct(average),
            processing_millis: batch.elapsed_millis,
            fps,
            source_width: batch.source_width,
            source_height: batch.source_height,
        }
    }
}

/// One line of the per-detection detail list.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub label: String,
    pub color: Option<PaletteColor>,
    pub confidence_pct: u32,
    pub width: u32,
    pub height: u32,
}

fn to_pct(value: f32) -> u32 {
    (value * 100.0).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), label, confidence)
    }

    #[test]
    fn caption_rounds_confidence() {
        assert_eq!(det("cat", 0.914).caption(), "cat (91%)");
        assert_eq!(det("dog", 0.806).caption(), "dog (81%)");
    }

    #[test]
    fn stats_average_confidence() {
        let batch = DetectionBatch {
            detections: vec![det("cat", 0.91), det("dog", 0.80), det("cat", 0.65)],
            elapsed_millis: 42,
            source_width: 640,
            source_height: 480,
        };
        let stats = DetectionStats::from_batch(&batch, None);
        assert_eq!(stats.object_count, 3);
        assert_eq!(stats.average_confidence_pct, 79);
        assert_eq!(stats.processing_millis, 42);
        assert_eq!(stats.fps, None);
    }

    #[test]
    fn stats_empty_batch() {
        let stats = DetectionStats::from_batch(&DetectionBatch::default(), Some(12));
        assert_eq!(stats.object_count, 0);
        assert_eq!(stats.average_confidence_pct, 0);
        assert_eq!(stats.fps, Some(12));
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 5.0, 5.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }
}
