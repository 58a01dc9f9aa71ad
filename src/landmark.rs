//! Hand landmark types and their projection back into the source frame.
//!
//! The second network stage predicts 21 landmarks in crop coordinates. Consumers want them in
//! source frame coordinates, so the crop transform has to be undone, followed by the padding
//! the capture stage added before detection.

use anyhow::bail;
use nalgebra::Point2;

use crate::{region::AffineTransform, slice::SliceExt};

/// Number of landmarks predicted per hand.
pub const LANDMARK_COUNT: usize = 21;

/// Names for all landmarks predicted by the landmark network.
///
/// The finger joints use their anatomical names: from the palm outwards, these are the
/// *metacarpophalangeal* (MCP), *proximal interphalangeal* (PIP), *distal interphalangeal*
/// (DIP) joints, and the finger tip. The thumb instead has *carpometacarpal* (CMC),
/// *metacarpophalangeal* (MCP) and *interphalangeal* (IP) joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

/// Pairs of landmarks connected by the hand skeleton.
///
/// Mostly useful for rendering the result.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Thumb:
        (Wrist, ThumbCmc),
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index finger:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle finger:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring finger:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
        // Surround the palm:
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (Wrist, PinkyMcp),
    ]
};

/// The raw output of the landmark network: 21 positions in crop coordinates.
///
/// `x` and `y` are pixels within the crop; `z` is a relative depth value that projection
/// passes through untouched.
#[derive(Debug, Clone)]
pub struct Landmarks {
    positions: Box<[[f32; 3]]>,
}

impl Landmarks {
    /// Builds landmarks from a flat buffer of `21 * 3` values in `x, y, z` order.
    pub fn from_raw(values: &[f32]) -> anyhow::Result<Self> {
        if values.len() != LANDMARK_COUNT * 3 {
            bail!(
                "landmark output has {} values, expected {}",
                values.len(),
                LANDMARK_COUNT * 3,
            );
        }

        let positions = values.array_chunks_exact::<3>().copied().collect();
        Ok(Self { positions })
    }

    /// Returns the `[x, y, z]` position of a landmark, in crop coordinates.
    pub fn position(&self, landmark: LandmarkIdx) -> [f32; 3] {
        self.positions[landmark as usize]
    }

    /// Returns all positions, indexed by [`LandmarkIdx`].
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }
}

/// The border the capture stage added to square up the frame before detection.
///
/// Field naming follows the capture convention: `width` carries the vertical border (rows
/// added at the top and bottom of the frame) and `height` the horizontal border (columns added
/// at the left and right). [`project_to_source`] subtracts `height` from X and `width` from Y,
/// which removes each border from the axis it was applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Padding {
    pub width: f32,
    pub height: f32,
}

impl Padding {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Projects crop-space landmarks back into source frame coordinates.
///
/// `transform` is the source-to-crop transform produced during region extraction. Its inverse
/// carries each landmark into the padded source frame; subtracting the capture `padding` then
/// yields positions in the original frame. The `z` component is not projected.
///
/// Returns [`None`] if `transform` is not invertible.
pub fn project_to_source(
    landmarks: &Landmarks,
    transform: &AffineTransform,
    padding: Padding,
) -> Option<Vec<Point2<f32>>> {
    let inverse = transform.inverse()?;
    let points = landmarks
        .positions()
        .iter()
        .map(|&[x, y, _]| {
            let p = inverse.apply(Point2::new(x, y));
            Point2::new(p.x - padding.height, p.y - padding.width)
        })
        .collect();
    Some(points)
}
