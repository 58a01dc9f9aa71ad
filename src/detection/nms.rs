//! Candidate selection by score filtering and Non-Maximum Suppression.
//!
//! A Single-Shot Detector scores every anchor independently, so one palm shows up as a cluster
//! of overlapping detections. Selection keeps the most confident detection of each cluster and
//! suppresses the rest, stopping once the configured number of palms has been accepted.

use std::cmp::Reverse;

use crate::num::TotalF32;

use super::{Candidate, DetectorOutput};

/// Reduces decoded detector output to the final palm candidates.
pub struct CandidateSelector {
    score_thresh: f32,
    iou_thresh: f32,
    max_candidates: usize,
    scratch: Vec<Candidate>,
    out_buf: Vec<Candidate>,
}

impl CandidateSelector {
    /// The default score a detection must exceed to be considered at all.
    pub const DEFAULT_SCORE_THRESH: f32 = 0.5;

    /// The default intersection-over-union threshold above which a detection counts as a
    /// duplicate of a better one.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a selector that accepts at most `max_candidates` palms per frame.
    ///
    /// # Panics
    ///
    /// Panics if `max_candidates` is 0.
    pub fn new(max_candidates: usize) -> Self {
        assert_ne!(max_candidates, 0);
        Self {
            score_thresh: Self::DEFAULT_SCORE_THRESH,
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            max_candidates,
            scratch: Vec::new(),
            out_buf: Vec::new(),
        }
    }

    /// Sets the score threshold. Detections scoring exactly `thresh` are dropped.
    pub fn set_score_thresh(&mut self, thresh: f32) {
        self.score_thresh = thresh;
    }

    /// Sets the IoU threshold. An overlap of exactly `thresh` does not suppress.
    pub fn set_iou_thresh(&mut self, thresh: f32) {
        self.iou_thresh = thresh;
    }

    /// Selects the best candidates from decoded detector `output`.
    ///
    /// Candidates are accepted in order of descending score; ties are broken towards the lower
    /// anchor index. Every accepted candidate suppresses the remaining candidates whose IoU
    /// with it exceeds the IoU threshold.
    pub fn select(&mut self, output: &DetectorOutput) -> impl Iterator<Item = Candidate> + '_ {
        self.scratch.clear();
        self.out_buf.clear();

        for (anchor, &score) in output.scores().iter().enumerate() {
            if score <= self.score_thresh {
                continue;
            }
            self.scratch.push(Candidate {
                score,
                rect: output.detection(anchor).bounding_rect(),
                anchor,
            });
        }

        // Sort so that the best candidate ends up at the back; ties put the lowest anchor
        // index last.
        self.scratch
            .sort_unstable_by_key(|c| (TotalF32(c.score()), Reverse(c.anchor_index())));

        while let Some(seed) = self.scratch.pop() {
            self.out_buf.push(seed);
            if self.out_buf.len() == self.max_candidates {
                break;
            }

            let seed_rect = seed.bounding_rect();
            self.scratch
                .retain(|other| seed_rect.iou(&other.bounding_rect()) <= self.iou_thresh);
        }

        self.out_buf.drain(..)
    }
}
