//! Keyboard input.
//!
//! Public types do not expose winit; the runtime translates platform events
//! into `InputEvent`s.

mod state;
mod types;

pub use state::InputState;
pub use types::{InputEvent, Key, KeyState};
