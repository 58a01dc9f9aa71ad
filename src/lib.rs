//! Real-time hand keypoint detection core.
//!
//! The pipeline follows the usual two-model split: a palm detector proposes hand locations on
//! a small square input image, then a landmark network refines a cropped hand region into 21
//! keypoints. Everything between and around the two models is geometry and bookkeeping, and
//! lives here: anchor decoding, candidate selection, crop extraction, and the projection of
//! landmarks back into the source frame.
//!
//! Model execution itself stays behind the [`backend::InferenceBackend`] trait. Dispatch
//! happens on a worker thread owned by [`dispatcher::InferenceDispatcher`], which never blocks
//! the thread that submits frames or reads results.

use log::LevelFilter;

pub mod backend;
pub mod detection;
pub mod dispatcher;
pub mod iter;
pub mod landmark;
pub mod num;
pub mod rect;
pub mod region;
pub mod slice;
pub mod tensor;
pub mod timer;

/// For use by [`init_logger!`] only, not part of the public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level by default; `RUST_LOG` overrides
/// apply on top.
///
/// If a global logger is already registered, this does nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
