//! Frame timing.

use instant::{Duration, Instant};

/// Measures the time between consecutive frames.
#[derive(Debug, Default)]
pub struct Clock {
    last: Option<Instant>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the previous call. The first call returns zero.
    pub fn delta(&mut self) -> Duration {
        let now = Instant::now();
        let dt = self
            .last
            .map_or(Duration::ZERO, |last| now.duration_since(last));
        self.last = Some(now);
        dt
    }

    /// Forgets the previous frame so the next delta is zero again.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delta_is_zero_then_monotonic() {
        let mut clock = Clock::new();
        assert_eq!(clock.delta(), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.delta() >= Duration::from_millis(2));

        clock.reset();
        assert_eq!(clock.delta(), Duration::ZERO);
    }
}
