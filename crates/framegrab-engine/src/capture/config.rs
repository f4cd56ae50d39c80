use std::path::PathBuf;

use crate::backend::ViewId;

/// How a [`Recorder`](super::Recorder) honours the one-frame read-back latency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReadbackPolicy {
    /// Advance one extra frame per capture and save it in the same iteration.
    #[default]
    Settle,
    /// Keep the capture in flight and save it after the next iteration's frame.
    Pipelined,
}

impl ReadbackPolicy {
    /// Parses `settle` or `pipelined`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "settle" => Some(ReadbackPolicy::Settle),
            "pipelined" => Some(ReadbackPolicy::Pipelined),
            _ => None,
        }
    }
}

/// Capture pipeline configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub out_dir: PathBuf,
    pub file_prefix: String,
    pub policy: ReadbackPolicy,
    /// View the capture frame buffer is bound to.
    pub view: ViewId,
    /// Frames `await_pixels` may advance before giving up.
    pub max_settle_frames: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            file_prefix: "output_".to_string(),
            policy: ReadbackPolicy::default(),
            view: 0,
            max_settle_frames: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_names() {
        assert_eq!(ReadbackPolicy::parse("Settle"), Some(ReadbackPolicy::Settle));
        assert_eq!(ReadbackPolicy::parse(" pipelined\n"), Some(ReadbackPolicy::Pipelined));
        assert_eq!(ReadbackPolicy::parse("eager"), None);
    }
}
