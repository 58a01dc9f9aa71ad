//! The inference backend seam.

use crate::{detection::DetectorOutput, landmark::Landmarks, tensor::Tensor, timer::LatencyStats};

/// A two-stage hand inference engine.
///
/// Implementations wrap the actual model runtime; everything in front of and behind the models
/// (decoding, selection, cropping, projection) stays runtime-independent. The dispatcher calls
/// into the backend from its worker thread, so implementations have to be [`Send`] and
/// [`Sync`].
pub trait InferenceBackend: Send + Sync {
    /// Runs the palm detection stage.
    ///
    /// `input` is the detector input image as a `[1, 192, 192, 3]` RGB tensor with values in
    /// the 0.0 to 1.0 range. The returned output is network-raw; decoding it is the caller's
    /// job.
    fn run_stage_one(&self, input: &Tensor) -> anyhow::Result<DetectorOutput>;

    /// Runs the landmark stage on a single hand crop.
    ///
    /// `input` is the crop as a `[1, 224, 224, 3]` RGB tensor with values in the 0.0 to 1.0
    /// range.
    fn run_stage_two(&self, input: &Tensor) -> anyhow::Result<Landmarks>;

    /// Reports the backend's own rolling latency over raw model execution.
    ///
    /// Backends time their stages with a [`LatencyStats`] of their own, so this reports the
    /// same statistic the dispatcher keeps for whole cycles and the two stay comparable.
    fn latency(&self) -> &LatencyStats;
}
