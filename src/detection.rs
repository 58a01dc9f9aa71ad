//! Palm detection postprocessing.
//!
//! The palm detector is a Single-Shot Detector: it emits one raw score and one 18-value box row
//! per [anchor](anchors). This module decodes those rows into detector input coordinates and
//! narrows them down to the final palm candidates (see [`nms`]).

pub mod anchors;
pub mod nms;

use anyhow::bail;
use nalgebra::Point2;

use crate::{iter::zip_exact, num::sigmoid, rect::Rect};

use self::anchors::{Anchor, AnchorTable};

/// Number of anchors (and output rows) of the palm detection network.
pub const ANCHOR_COUNT: usize = 2016;

/// Side length of the square detector input image, in pixels.
pub const INPUT_SIZE: u32 = 192;

/// Number of values in one raw box row: center, size, and 7 keypoints.
pub const BOX_VALUES: usize = 18;

/// The keypoints of a palm detection.
///
/// These are the 7 coarse points located by the detector, not the 21 landmarks computed by the
/// second stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// The raw output of the palm detection stage.
///
/// `scores` holds one value per anchor, `boxes` the matching 18-value rows. Both start out
/// network-raw; [`decode_in_place`] turns them into scores in the 0.0 to 1.0 range and box
/// centers in absolute detector input coordinates.
pub struct DetectorOutput {
    scores: Vec<f32>,
    boxes: Vec<f32>,
}

impl DetectorOutput {
    /// Bundles raw detector output, checking that `boxes` holds one 18-value row per score.
    pub fn new(scores: Vec<f32>, boxes: Vec<f32>) -> anyhow::Result<Self> {
        if boxes.len() != scores.len() * BOX_VALUES {
            bail!(
                "detector output mismatch: {} scores but {} box values (expected {})",
                scores.len(),
                boxes.len(),
                scores.len() * BOX_VALUES,
            );
        }
        Ok(Self { scores, boxes })
    }

    /// Number of anchor rows in this output.
    pub fn anchor_count(&self) -> usize {
        self.scores.len()
    }

    /// Returns the per-anchor scores.
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Returns the box row belonging to the anchor at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`Self::anchor_count`].
    pub fn detection(&self, index: usize) -> RawDetection<'_> {
        let start = index * BOX_VALUES;
        let values = self.boxes[start..start + BOX_VALUES].try_into().unwrap();
        RawDetection { values }
    }
}

/// Decodes raw detector `output` in place.
///
/// Scores are passed through the logistic function. Box centers are shifted by their anchor's
/// center, turning them into absolute detector input coordinates. Box sizes and keypoint
/// offsets stay untouched; keypoints remain anchor-relative until they are resolved with
/// [`RawDetection::keypoint`].
///
/// # Panics
///
/// Panics unless `output` holds exactly one row per anchor in `anchors`.
pub fn decode_in_place(output: &mut DetectorOutput, anchors: &AnchorTable) {
    for score in &mut output.scores {
        *score = sigmoid(*score);
    }

    let input_size = INPUT_SIZE as f32;
    for (row, anchor) in zip_exact(output.boxes.chunks_exact_mut(BOX_VALUES), anchors.iter()) {
        row[0] += anchor.x_center() * input_size;
        row[1] += anchor.y_center() * input_size;
    }
}

/// One 18-value detection row, after decoding.
#[derive(Clone, Copy)]
pub struct RawDetection<'a> {
    values: &'a [f32; BOX_VALUES],
}

impl<'a> RawDetection<'a> {
    /// X coordinate of the box center, in detector input coordinates.
    pub fn x_center(&self) -> f32 {
        self.values[0]
    }

    /// Y coordinate of the box center, in detector input coordinates.
    pub fn y_center(&self) -> f32 {
        self.values[1]
    }

    pub fn width(&self) -> f32 {
        self.values[2]
    }

    pub fn height(&self) -> f32 {
        self.values[3]
    }

    /// Returns the bounding box of the palm, in detector input coordinates.
    pub fn bounding_rect(&self) -> Rect {
        Rect::from_center(self.x_center(), self.y_center(), self.width(), self.height())
    }

    /// Returns the position of `keypoint`, in detector input coordinates.
    ///
    /// Keypoint values are stored relative to the anchor the row belongs to, so resolving them
    /// needs the matching `anchor`.
    pub fn keypoint(&self, keypoint: Keypoint, anchor: &Anchor) -> Point2<f32> {
        let base = 4 + keypoint as usize * 2;
        let input_size = INPUT_SIZE as f32;
        Point2::new(
            self.values[base] + anchor.x_center() * input_size,
            self.values[base + 1] + anchor.y_center() * input_size,
        )
    }
}

/// A detection that passed the score filter.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    score: f32,
    rect: Rect,
    anchor: usize,
}

impl Candidate {
    /// The decoded confidence score, between 0.0 and 1.0.
    pub fn score(&self) -> f32 {
        self.score
    }

    /// Bounding box of the palm, in detector input coordinates.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Index of the anchor this candidate was decoded from.
    pub fn anchor_index(&self) -> usize {
        self.anchor
    }
}
