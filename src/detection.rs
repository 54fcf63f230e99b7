//! Detection batches passed to and returned by the tracker.

use nalgebra::DMatrix;

use crate::matching::non_max_suppression;
use crate::{Error, Result};

/// Confidence assumed for every box when a batch carries no confidence array.
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// A single detection read out of a [`Detections`] batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Box corners `[x1, y1, x2, y2]`.
    pub xyxy: [f64; 4],
    pub confidence: Option<f64>,
    pub class_id: Option<i64>,
    pub tracker_id: Option<u64>,
}

/// An ordered batch of N boxes with optional parallel arrays.
///
/// Every parallel array that is present has exactly N entries; an absent array
/// means the field was not provided, not that it is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Detections {
    xyxy: DMatrix<f64>,
    confidence: Option<Vec<f64>>,
    class_id: Option<Vec<i64>>,
    tracker_id: Option<Vec<u64>>,
}

impl Detections {
    /// Create a batch from an `(n, 4)` matrix of `[x1, y1, x2, y2]` rows.
    pub fn new(xyxy: DMatrix<f64>) -> Result<Self> {
        if xyxy.ncols() != 4 {
            return Err(Error::shape(
                "(n, 4) boxes [x1, y1, x2, y2]",
                format!("({}, {})", xyxy.nrows(), xyxy.ncols()),
            ));
        }
        Ok(Self {
            xyxy,
            confidence: None,
            class_id: None,
            tracker_id: None,
        })
    }

    /// Create a batch from box rows.
    pub fn from_boxes(boxes: &[[f64; 4]]) -> Self {
        let flat: Vec<f64> = boxes.iter().flat_map(|b| b.iter().copied()).collect();
        Self {
            xyxy: DMatrix::from_row_slice(boxes.len(), 4, &flat),
            confidence: None,
            class_id: None,
            tracker_id: None,
        }
    }

    /// A batch with no detections.
    pub fn empty() -> Self {
        Self::from_boxes(&[])
    }

    /// Create a batch with all optional arrays at once.
    pub fn with_config(
        xyxy: DMatrix<f64>,
        confidence: Option<Vec<f64>>,
        class_id: Option<Vec<i64>>,
        tracker_id: Option<Vec<u64>>,
    ) -> Result<Self> {
        let mut detections = Self::new(xyxy)?;
        if let Some(c) = confidence {
            detections = detections.with_confidence(c)?;
        }
        if let Some(c) = class_id {
            detections = detections.with_class_id(c)?;
        }
        if let Some(t) = tracker_id {
            detections = detections.with_tracker_id(t)?;
        }
        Ok(detections)
    }

    pub fn with_confidence(mut self, confidence: Vec<f64>) -> Result<Self> {
        self.check_len("confidence", confidence.len())?;
        self.confidence = Some(confidence);
        Ok(self)
    }

    pub fn with_class_id(mut self, class_id: Vec<i64>) -> Result<Self> {
        self.check_len("class_id", class_id.len())?;
        self.class_id = Some(class_id);
        Ok(self)
    }

    pub fn with_tracker_id(mut self, tracker_id: Vec<u64>) -> Result<Self> {
        self.check_len("tracker_id", tracker_id.len())?;
        self.tracker_id = Some(tracker_id);
        Ok(self)
    }

    fn check_len(&self, field: &str, len: usize) -> Result<()> {
        if len != self.len() {
            return Err(Error::shape(
                format!("{} of length {}", field, self.len()),
                format!("length {}", len),
            ));
        }
        Ok(())
    }

    /// Check that every box is finite with positive height and every
    /// confidence is finite.
    ///
    /// Boxes are tracked as `[cx, cy, w / h, h]`, so a non-finite coordinate or
    /// a zero height would poison the motion state of the track it seeds.
    pub fn validate(&self) -> Result<()> {
        for i in 0..self.len() {
            let [_, y1, _, y2] = self.box_at(i);
            if self.xyxy.row(i).iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "box {} has non-finite coordinates",
                    i
                )));
            }
            if y2 <= y1 {
                return Err(Error::InvalidInput(format!(
                    "box {} has non-positive height",
                    i
                )));
            }
        }

        if let Some(i) = self
            .confidence
            .as_ref()
            .and_then(|c| c.iter().position(|v| !v.is_finite()))
        {
            return Err(Error::InvalidInput(format!(
                "confidence {} is not finite",
                i
            )));
        }

        Ok(())
    }

    /// Number of detections in the batch.
    pub fn len(&self) -> usize {
        self.xyxy.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Box matrix of shape `(n, 4)`.
    pub fn xyxy(&self) -> &DMatrix<f64> {
        &self.xyxy
    }

    pub fn confidence(&self) -> Option<&[f64]> {
        self.confidence.as_deref()
    }

    pub fn class_id(&self) -> Option<&[i64]> {
        self.class_id.as_deref()
    }

    pub fn tracker_id(&self) -> Option<&[u64]> {
        self.tracker_id.as_deref()
    }

    /// Box `i`. Panics if out of range.
    pub(crate) fn box_at(&self, i: usize) -> [f64; 4] {
        [
            self.xyxy[(i, 0)],
            self.xyxy[(i, 1)],
            self.xyxy[(i, 2)],
            self.xyxy[(i, 3)],
        ]
    }

    /// Confidence of detection `i`, or [`DEFAULT_CONFIDENCE`] when absent.
    pub(crate) fn confidence_at(&self, i: usize) -> f64 {
        self.confidence
            .as_ref()
            .map_or(DEFAULT_CONFIDENCE, |c| c[i])
    }

    /// Get detection `i`.
    pub fn get(&self, index: usize) -> Result<Detection> {
        if index >= self.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(Detection {
            xyxy: self.box_at(index),
            confidence: self.confidence.as_ref().map(|c| c[index]),
            class_id: self.class_id.as_ref().map(|c| c[index]),
            tracker_id: self.tracker_id.as_ref().map(|t| t[index]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i).ok())
    }

    /// New batch holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(Error::OutOfRange {
                index,
                len: self.len(),
            });
        }

        let boxes: Vec<[f64; 4]> = indices.iter().map(|&i| self.box_at(i)).collect();

        Ok(Self {
            confidence: pick(&self.confidence, indices),
            class_id: pick(&self.class_id, indices),
            tracker_id: pick(&self.tracker_id, indices),
            ..Self::from_boxes(&boxes)
        })
    }

    /// New batch holding the rows where `mask` is true.
    pub fn filter_by_mask(&self, mask: &[bool]) -> Result<Self> {
        self.check_len("mask", mask.len())?;
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.select(&indices)
    }

    /// Apply non-max suppression, keeping the higher-confidence box of each
    /// overlapping group.
    pub fn with_nms(&self, threshold: f64) -> Result<Self> {
        let confidence: Vec<f64> = (0..self.len()).map(|i| self.confidence_at(i)).collect();
        let keep = non_max_suppression(&self.xyxy, &confidence, threshold)?;
        self.filter_by_mask(&keep)
    }
}

fn pick<T: Copy>(values: &Option<Vec<T>>, indices: &[usize]) -> Option<Vec<T>> {
    values
        .as_ref()
        .map(|v| indices.iter().map(|&i| v[i]).collect())
}

impl Default for Detections {
    fn default() -> Self {
        Self::empty()
    }
}
