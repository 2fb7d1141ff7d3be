use std::collections::HashMap;

use crate::models::{ColorLegendEntry, DetailRow, Detection};
use crate::render::color_at;

/// One legend entry per distinct label, in first-occurrence order.
///
/// Colors are assigned by the entry's position among distinct labels, which
/// is not the per-instance index the overlay renderer uses, so a label's
/// legend swatch and its box color may differ on the same frame.
pub fn summarize(detections: &[Detection]) -> Vec<ColorLegendEntry> {
    let mut entries: Vec<ColorLegendEntry> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for detection in detections {
        match index.get(detection.label.as_str()) {
            Some(&pos) => entries[pos].count += 1,
            None => {
                let pos = entries.len();
                index.insert(detection.label.as_str(), pos);
                entries.push(ColorLegendEntry {
                    label: detection.label.clone(),
                    color: color_at(pos),
                    count: 1,
                });
            }
        }
    }

    entries
}

/// Rows for the detail list, colored with the legend color of their label.
pub fn detail_rows(detections: &[Detection], legend: &[ColorLegendEntry]) -> Vec<DetailRow> {
    detections
        .iter()
        .map(|d| DetailRow {
            label: d.label.clone(),
            color: legend.iter().find(|e| e.label == d.label).map(|e| e.color),
            confidence_pct: d.confidence_pct(),
            width: d.bbox.width.round().max(0.0) as u32,
            height: d.bbox.height.round().max(0.0) as u32,
        })
        .collect()
}
