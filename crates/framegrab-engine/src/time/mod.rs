//! Frame timing.
//!
//! One `FrameClock` per loop; `tick()` once per frame advance.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
