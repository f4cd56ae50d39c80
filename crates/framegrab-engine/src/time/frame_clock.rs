use std::time::Instant;

/// Timing snapshot for one loop iteration.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the clock started.
    pub elapsed: f32,

    /// Iteration counter, starting at 0. Drives the scene rotation.
    pub frame_index: u64,
}

/// Produces `FrameTime` snapshots.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    frame_index: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_index: 0,
        }
    }

    pub fn tick(&mut self) -> FrameTime {
        let ft = FrameTime {
            elapsed: self.start.elapsed().as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_counts_from_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick().frame_index, 0);
        assert_eq!(clock.tick().frame_index, 1);
    }

    #[test]
    fn elapsed_never_decreases() {
        let mut clock = FrameClock::new();
        let first = clock.tick().elapsed;
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.tick().elapsed > first);
    }
}
