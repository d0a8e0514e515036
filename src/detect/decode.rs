//! Raw output decoding and overlap suppression.

use std::cmp::Ordering;

use super::backend::RawOutput;

/// Integer box in source-image pixels, top-left plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoxRect {
    fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }
}

/// A scored box that passed the confidence cut.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub rect: BoxRect,
}

/// Column layout of an output row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowLayout {
    /// Rows carry an objectness column between the box and the class scores.
    pub objectness: bool,
}

impl RowLayout {
    fn score_offset(&self) -> usize {
        if self.objectness {
            5
        } else {
            4
        }
    }
}

/// Turn raw rows into candidates scaled to a `frame_width` x `frame_height`
/// image. Rows whose best class score is not above `confidence` are dropped.
pub fn decode_outputs(
    outputs: &[RawOutput],
    layout: RowLayout,
    frame_width: u32,
    frame_height: u32,
    confidence: f32,
) -> Vec<Candidate> {
    let offset = layout.score_offset();
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    let mut candidates = Vec::new();

    for output in outputs {
        if output.cols() <= offset {
            log::debug!(
                "ignoring output with {} columns (need more than {})",
                output.cols(),
                offset
            );
            continue;
        }
        for row in output.rows() {
            let Some((class_id, score)) = argmax(&row[offset..]) else {
                continue;
            };
            if !(score > confidence) {
                continue;
            }
            let center_x = (row[0] * fw) as i32;
            let center_y = (row[1] * fh) as i32;
            let width = (row[2] * fw) as i32;
            let height = (row[3] * fh) as i32;
            candidates.push(Candidate {
                class_id,
                confidence: score,
                rect: BoxRect {
                    x: (center_x as f32 - width as f32 / 2.0) as i32,
                    y: (center_y as f32 - height as f32 / 2.0) as i32,
                    width,
                    height,
                },
            });
        }
    }
    candidates
}

/// Index and value of the first maximum.
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if !(score > top) => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

/// Intersection over union of two integer boxes. Zero for disjoint or
/// degenerate boxes.
pub fn iou(a: &BoxRect, b: &BoxRect) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);

    let intersection = i64::from((right - left).max(0)) * i64::from((bottom - top).max(0));
    let union = a.area() + b.area() - intersection;
    if union <= 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Greedy, class-agnostic overlap suppression.
///
/// Candidates above `score_threshold` are visited by descending confidence
/// (ties keep input order). A candidate is kept unless its IoU with an
/// already-kept candidate exceeds `iou_threshold`.
pub fn suppress(candidates: &[Candidate], score_threshold: f32, iou_threshold: f32) -> Vec<Candidate> {
    let mut ordered: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.confidence > score_threshold)
        .collect();
    ordered.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if kept
            .iter()
            .all(|k| iou(&k.rect, &candidate.rect) <= iou_threshold)
        {
            kept.push(*candidate);
        }
    }
    kept
}
