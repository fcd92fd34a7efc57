//! Decoding of the YOLOv8 detection head and non-maximum suppression.

use anyhow::Result;
use ndarray::{s, Array, Axis, Ix3, IxDyn};

use crate::common::{DetBox, Detection};

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
}

impl Nms for Detection {
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Decodes a raw `[1, 4 + nc, anchors]` output (cxcywh + per-class scores,
/// no objectness) into detections in original-image coordinates.
///
/// Scores below `conf_threshold` are dropped; the filter is a plain `>=`.
/// Boxes are mapped back through the letterbox `ratio` and clamped to the
/// image bounds before per-class NMS.
pub fn decode_predictions(
    output: &Array<f32, IxDyn>,
    names: &[String],
    conf_threshold: f32,
    iou_threshold: f32,
    ratio: f32,
    img_width: f32,
    img_height: f32,
) -> Result<Vec<Detection>> {
    let view = output.view().into_dimensionality::<Ix3>()?;
    let preds = view.index_axis(Axis(0), 0);
    let num_anchors = preds.shape()[1];

    let mut detections = Vec::new();
    for i in 0..num_anchors {
        let scores = preds.slice(s![4.., i]);
        let best = scores
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b));
        let (class_id, &confidence) = match best {
            Some(hit) => hit,
            None => continue,
        };

        if confidence < conf_threshold {
            continue;
        }

        let cx = preds[[0, i]] / ratio;
        let cy = preds[[1, i]] / ratio;
        let w = preds[[2, i]] / ratio;
        let h = preds[[3, i]] / ratio;

        let bbox = DetBox::from_cxcywh(cx, cy, w, h).clamp(img_width, img_height);
        if bbox.width() < 1.0 || bbox.height() < 1.0 {
            continue;
        }

        let label = names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("# {class_id}"));

        detections.push(Detection::new(class_id, label, confidence, bbox));
    }

    Ok(non_max_suppression(detections, iou_threshold))
}

/// Greedy per-class NMS: keep the highest-confidence box, suppress any
/// same-class box overlapping it beyond `iou_threshold`.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::new();
    'candidates: for det in detections {
        for kept in &keep {
            if kept.class_id == det.class_id && Nms::iou(kept, &det) > iou_threshold {
                continue 'candidates;
            }
        }
        keep.push(det);
    }
    keep
}
