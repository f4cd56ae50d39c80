//! Resolution bookkeeping shared by the runtime, the backends and the capture loop.
//!
//! Sizes are physical pixels. The active output resolution lives in a single
//! `ViewportState` owned by the host loop; there is no process-wide copy.

mod viewport;

pub use viewport::{ViewRect, ViewportState};
