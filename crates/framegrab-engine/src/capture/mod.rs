//! Off-screen render and capture.
//!
//! A capture renders the scene into its own render target, blits the target
//! into a read-back surface and copies that surface into host memory. The copy
//! lands one frame after it is requested, so a capture spans two frame
//! advances. [`Recorder`] strings captures together for a host loop.

mod config;
mod encode;
mod naming;
mod pipeline;
mod pixels;
mod recorder;

pub use config::{CaptureConfig, ReadbackPolicy};
pub use encode::encode_and_save;
pub use naming::OutputNamer;
pub use pipeline::{Capture, CapturePipeline, CaptureStage, CaptureStats, SceneSubmission};
pub use pixels::{PixelBuffer, PixelState};
pub use recorder::Recorder;
