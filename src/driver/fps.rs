use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frames-per-second counter that publishes the number of frames completed
/// in each elapsed one-second window.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: u32,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0,
        }
    }

    /// Count a completed frame and return the current reading.
    pub fn tick(&mut self, now: Instant) -> u32 {
        self.frames += 1;
        if now.saturating_duration_since(self.window_start) >= WINDOW {
            self.fps = self.frames;
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn current(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_once_per_second() {
        let t0 = Instant::now();
        let mut meter = FpsMeter::new(t0);

        for i in 1..=9 {
            assert_eq!(meter.tick(t0 + Duration::from_millis(i * 100)), 0);
        }
        assert_eq!(meter.tick(t0 + Duration::from_millis(1000)), 10);

        // The next window starts from the publishing frame.
        assert_eq!(meter.tick(t0 + Duration::from_millis(1500)), 10);
        assert_eq!(meter.tick(t0 + Duration::from_millis(2000)), 2);
        assert_eq!(meter.current(), 2);
    }

    #[test]
    fn slow_frames_read_as_one() {
        let t0 = Instant::now();
        let mut meter = FpsMeter::new(t0);
        assert_eq!(meter.tick(t0 + Duration::from_secs(3)), 1);
    }
}
