use image::{RgbImage, imageops::FilterType};

use super::RawPrediction;
use super::labels::label_for;
use crate::models::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloParams {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl From<&crate::config::ModelConfig> for YoloParams {
    fn from(cfg: &crate::config::ModelConfig) -> Self {
        Self {
            input_size: cfg.input_size,
            confidence_threshold: cfg.confidence_threshold,
            iou_threshold: cfg.iou_threshold,
            max_detections: cfg.max_detections,
        }
    }
}

/// Planar CHW tensor data in `[0, 1]`, shape `[1, 3, size, size]`.
pub fn preprocess(frame: &RgbImage, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0f32; plane * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        data[idx] = pixel[0] as f32 / 255.0;
        data[plane + idx] = pixel[1] as f32 / 255.0;
        data[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }
    data
}

struct Candidate {
    bbox: BoundingBox,
    class_id: usize,
    score: f32,
}

/// Decode a `[1, 4 + C, N]` (or transposed `[1, N, 4 + C]`) output tensor.
pub fn decode(
    data: &[f32],
    dims: &[usize],
    params: &YoloParams,
    labels: &[String],
    source_width: u32,
    source_height: u32,
) -> Vec<RawPrediction> {
    if dims.len() != 3 || dims[1] == 0 || dims[2] == 0 {
        return Vec::new();
    }
    // Candidates always outnumber attributes.
    let transposed = dims[1] > dims[2];
    let (attrs, count) = if transposed {
        (dims[2], dims[1])
    } else {
        (dims[1], dims[2])
    };
    if attrs <= 4 || data.len() < attrs * count {
        return Vec::new();
    }
    let at = |attr: usize, i: usize| {
        if transposed {
            data[i * attrs + attr]
        } else {
            data[attr * count + i]
        }
    };

    let size = params.input_size as f32;
    let sx = source_width as f32 / size;
    let sy = source_height as f32 / size;

    let mut candidates = Vec::new();
    for i in 0..count {
        let (class_id, score) = (4..attrs)
            .map(|a| (a - 4, at(a, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < params.confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        candidates.push(Candidate {
            bbox: BoundingBox::new((cx - w / 2.0) * sx, (cy - h / 2.0) * sy, w * sx, h * sy),
            class_id,
            score,
        });
    }

    nms(candidates, params.iou_threshold)
        .into_iter()
        .take(params.max_detections)
        .map(|c| RawPrediction {
            bbox: [c.bbox.x, c.bbox.y, c.bbox.width, c.bbox.height],
            class: label_for(labels, c.class_id),
            score: c.score,
        })
        .collect()
}

/// Per-class non-maximum suppression; output is sorted by score.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::labels::coco_labels;

    fn params() -> YoloParams {
        YoloParams {
            input_size: 100,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 10,
        }
    }

    /// Build a `[1, 4 + classes, n]` tensor from per-candidate rows, padded
    /// with empty candidates so the layout is unambiguous.
    fn tensor(rows: &[[f32; 7]]) -> (Vec<f32>, Vec<usize>) {
        let attrs = 7;
        let n = rows.len().max(attrs + 1);
        let mut data = vec![0f32; attrs * n];
        for (i, row) in rows.iter().enumerate() {
            for a in 0..attrs {
                data[a * n + i] = row[a];
            }
        }
        (data, vec![1, attrs, n])
    }

    #[test]
    fn decodes_into_source_pixels() {
        // Three classes: person, bicycle, car.
        let (data, dims) = tensor(&[[50.0, 50.0, 20.0, 10.0, 0.1, 0.9, 0.2]]);
        let out = decode(&data, &dims, &params(), &coco_labels(), 200, 300);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class, "bicycle");
        assert_eq!(out[0].score, 0.9);
        assert_eq!(out[0].bbox, [80.0, 135.0, 40.0, 30.0]);
    }

    #[test]
    fn drops_low_confidence_and_suppresses_overlaps() {
        let (data, dims) = tensor(&[
            [50.0, 50.0, 20.0, 20.0, 0.8, 0.0, 0.0],
            [51.0, 50.0, 20.0, 20.0, 0.9, 0.0, 0.0],
            [51.0, 50.0, 20.0, 20.0, 0.0, 0.0, 0.7],
            [10.0, 10.0, 5.0, 5.0, 0.3, 0.0, 0.0],
        ]);
        let out = decode(&data, &dims, &params(), &coco_labels(), 100, 100);

        let summary: Vec<(&str, f32)> = out.iter().map(|p| (p.class.as_str(), p.score)).collect();
        assert_eq!(summary, vec![("person", 0.9), ("car", 0.7)]);
    }

    #[test]
    fn caps_at_max_detections() {
        let rows: Vec<[f32; 7]> = (0..5)
            .map(|i| [10.0 + 20.0 * i as f32, 10.0, 5.0, 5.0, 0.9 - i as f32 * 0.01, 0.0, 0.0])
            .collect();
        let (data, dims) = tensor(&rows);
        let mut p = params();
        p.max_detections = 3;
        assert_eq!(decode(&data, &dims, &p, &coco_labels(), 100, 100).len(), 3);
    }

    #[test]
    fn handles_transposed_layout() {
        // [1, N, 7] with N > 7.
        let n = 8;
        let mut data = vec![0f32; n * 7];
        data[..7].copy_from_slice(&[50.0, 50.0, 10.0, 10.0, 0.0, 0.0, 0.95]);
        let out = decode(&data, &[1, n, 7], &params(), &coco_labels(), 100, 100);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class, "car");
    }

    #[test]
    fn preprocess_is_planar_and_normalized() {
        let frame = RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 51]));
        let data = preprocess(&frame, 4);
        assert_eq!(data.len(), 3 * 16);
        assert_eq!(data[0], 1.0);
        assert_eq!(data[16], 0.0);
        assert!((data[32] - 0.2).abs() < 1e-6);
    }
}
