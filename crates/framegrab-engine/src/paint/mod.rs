//! Colour types.

mod color;

pub use color::Rgba8;
