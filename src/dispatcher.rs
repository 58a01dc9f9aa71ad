//! Asynchronous inference dispatch.
//!
//! Inference runs on a dedicated worker thread so that capture and rendering never wait on the
//! models. Frames are handed over through a single latest-wins slot, results are published
//! through a double buffer, and readers only ever observe completely written results.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
    time::Instant,
};

use anyhow::bail;
use crossbeam::channel::{Receiver, Sender, TrySendError};
use nalgebra::Point2;

use crate::{
    backend::InferenceBackend,
    detection::{anchors::AnchorTable, decode_in_place, nms::CandidateSelector},
    landmark::{project_to_source, Padding},
    region::RegionTransformer,
    tensor::Tensor,
    timer::LatencyStats,
};

/// Number of hands tracked per frame.
const MAX_HANDS: usize = 1;

/// One captured frame, prepared for inference.
///
/// The capture stage owns color conversion and padding; it submits the detector input tensor
/// together with the padded source frame that the hand crop is later sampled from.
pub struct InputFrame {
    /// Detector input as a `[1, 192, 192, 3]` RGB tensor with values in the 0.0 to 1.0 range.
    pub detector_input: Tensor,
    /// The padded source frame.
    pub source: image::RgbImage,
    /// The border that was added to `source`.
    pub padding: Padding,
}

/// The published result of one inference cycle.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    detected: bool,
    landmarks: Vec<Point2<f32>>,
}

impl DetectionResult {
    /// Returns whether a hand was found in the frame this result belongs to.
    pub fn detected(&self) -> bool {
        self.detected
    }

    /// The landmark positions in source frame coordinates, indexed by
    /// [`LandmarkIdx`](crate::landmark::LandmarkIdx).
    ///
    /// Empty unless [`detected`](Self::detected) returns `true`.
    pub fn landmarks(&self) -> &[Point2<f32>] {
        &self.landmarks
    }
}

/// State shared between the dispatcher handle and its worker thread.
struct Shared {
    /// The latest submitted frame. Submitting while one is queued replaces it.
    pending: Mutex<Option<InputFrame>>,
    busy: AtomicBool,
    stop: AtomicBool,
    results: [Mutex<DetectionResult>; 2],
    /// Index of the buffer readers take results from. The worker writes the other buffer,
    /// then flips this index with `Release` ordering so the write is visible before the flip.
    current: AtomicUsize,
    latency: LatencyStats,
}

impl Shared {
    fn publish(&self, result: DetectionResult) {
        let back = 1 - self.current.load(Ordering::Relaxed);
        *self.results[back].lock().unwrap() = result;
        self.current.store(back, Ordering::Release);
    }

    fn latest(&self) -> DetectionResult {
        let index = self.current.load(Ordering::Acquire);
        self.results[index].lock().unwrap().clone()
    }
}

/// Drives the two-stage hand pipeline on a dedicated worker thread.
pub struct InferenceDispatcher {
    anchors: Arc<AnchorTable>,
    backend: Option<Arc<dyn InferenceBackend>>,
    shared: Arc<Shared>,
    signal: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl InferenceDispatcher {
    /// Creates a dispatcher that decodes detector output against `anchors`.
    ///
    /// No backend is attached yet and no thread is spawned; call
    /// [`attach_backend`](Self::attach_backend) followed by [`start`](Self::start).
    pub fn new(anchors: Arc<AnchorTable>) -> Self {
        Self {
            anchors,
            backend: None,
            shared: Arc::new(Shared {
                pending: Mutex::new(None),
                busy: AtomicBool::new(false),
                stop: AtomicBool::new(false),
                results: [
                    Mutex::new(DetectionResult::default()),
                    Mutex::new(DetectionResult::default()),
                ],
                current: AtomicUsize::new(0),
                latency: LatencyStats::new(),
            }),
            signal: None,
            worker: None,
        }
    }

    /// Attaches the inference backend that [`start`](Self::start) will drive.
    pub fn attach_backend(&mut self, backend: Arc<dyn InferenceBackend>) {
        self.backend = Some(backend);
    }

    /// Spawns the inference worker thread.
    ///
    /// Fails if no backend is attached or if the dispatcher is already running. A dispatcher
    /// that was stopped can be started again.
    pub fn start(&mut self) -> anyhow::Result<()> {
        let Some(backend) = self.backend.clone() else {
            bail!("no inference backend attached");
        };
        if self.worker.is_some() {
            bail!("inference worker is already running");
        }

        self.shared.stop.store(false, Ordering::SeqCst);
        let (sender, recv) = crossbeam::channel::bounded(1);
        let shared = self.shared.clone();
        let anchors = self.anchors.clone();
        let handle = std::thread::Builder::new()
            .name("inference".into())
            .spawn(move || worker(shared, anchors, backend, recv))?;

        self.signal = Some(sender);
        self.worker = Some(handle);
        Ok(())
    }

    /// Hands a frame to the worker without blocking.
    ///
    /// The pending slot holds a single frame. Submitting while one is already queued replaces
    /// it, so after a slow cycle the worker always resumes with the newest frame instead of
    /// working through a backlog.
    pub fn submit_frame(&self, frame: InputFrame) {
        *self.shared.pending.lock().unwrap() = Some(frame);
    }

    /// Returns whether the worker is currently inside an inference cycle.
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    /// Wakes the worker so it processes the pending frame.
    ///
    /// Does nothing while a cycle is already running, and never blocks: the wake signal is
    /// dropped if one is already queued.
    pub fn request_next_cycle(&self) {
        if self.is_busy() {
            return;
        }
        if let Some(signal) = &self.signal {
            match signal.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => {
                    log::warn!("inference worker is gone, ignoring cycle request");
                }
            }
        }
    }

    /// Returns a copy of the most recently published result.
    ///
    /// This never waits for the worker: results go through a double buffer, so the returned
    /// value is always a complete, previously published result (or the default before the
    /// first cycle finishes).
    pub fn latest_result(&self) -> DetectionResult {
        self.shared.latest()
    }

    /// Mean duration of recent inference cycles, in milliseconds.
    ///
    /// Reports 0.0 until enough cycles have completed (see [`LatencyStats`]). Failed cycles
    /// count as well.
    pub fn average_latency_ms(&self) -> f32 {
        self.shared.latency.average_ms()
    }

    /// Stops the worker thread and waits for it to exit.
    ///
    /// A cycle that is in flight still completes. Does nothing if the dispatcher is not
    /// running.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        drop(self.signal.take());
        if let Some(worker) = self.worker.take() {
            if let Err(payload) = worker.join() {
                if !std::thread::panicking() {
                    std::panic::resume_unwind(payload);
                }
            }
        }
    }
}

impl Drop for InferenceDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker(
    shared: Arc<Shared>,
    anchors: Arc<AnchorTable>,
    backend: Arc<dyn InferenceBackend>,
    recv: Receiver<()>,
) {
    log::trace!("inference worker starting");
    let mut selector = CandidateSelector::new(MAX_HANDS);
    let transformer = RegionTransformer::new();

    for () in recv {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }
        let Some(frame) = shared.pending.lock().unwrap().take() else {
            continue;
        };

        shared.busy.store(true, Ordering::SeqCst);
        let start = Instant::now();
        let result = match run_cycle(&frame, &anchors, &*backend, &mut selector, &transformer) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("inference cycle failed: {err:#}");
                DetectionResult::default()
            }
        };
        shared.publish(result);
        shared.latency.record(start.elapsed());
        shared.busy.store(false, Ordering::SeqCst);
    }
    log::trace!("inference worker exiting");
}

/// Runs one full frame through both stages.
///
/// Recoverable conditions (no hand, degenerate geometry) come back as a default result;
/// backend failures and malformed outputs are returned as errors.
fn run_cycle(
    frame: &InputFrame,
    anchors: &AnchorTable,
    backend: &dyn InferenceBackend,
    selector: &mut CandidateSelector,
    transformer: &RegionTransformer,
) -> anyhow::Result<DetectionResult> {
    let mut output = backend.run_stage_one(&frame.detector_input)?;
    if output.anchor_count() != anchors.anchor_count() {
        bail!(
            "detector output covers {} anchors, expected {}",
            output.anchor_count(),
            anchors.anchor_count(),
        );
    }

    decode_in_place(&mut output, anchors);
    let Some(best) = selector.select(&output).next() else {
        log::debug!("no candidate above the score threshold");
        return Ok(DetectionResult::default());
    };

    let detection = output.detection(best.anchor_index());
    let anchor = &anchors[best.anchor_index()];
    let Some(triangle) = transformer.triangle(detection, anchor) else {
        log::debug!("palm keypoints are degenerate, dropping candidate");
        return Ok(DetectionResult::default());
    };
    let Some((crop, transform)) = transformer.extract(&frame.source, &triangle) else {
        log::debug!("crop triangle collapsed, dropping candidate");
        return Ok(DetectionResult::default());
    };

    let landmarks = backend.run_stage_two(&crop)?;
    let Some(points) = project_to_source(&landmarks, &transform, frame.padding) else {
        log::debug!("crop transform is not invertible, dropping candidate");
        return Ok(DetectionResult::default());
    };

    log::trace!(
        "hand at anchor {} (score {:.2})",
        best.anchor_index(),
        best.score(),
    );
    Ok(DetectionResult {
        detected: true,
        landmarks: points,
    })
}
