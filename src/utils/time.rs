use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Timer for measuring operation latency
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed time without stopping the timer
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Wall-clock helpers
pub struct Clock;

impl Clock {
    /// Get milliseconds since Unix epoch
    pub fn millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Get microseconds since Unix epoch
    pub fn micros() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::start();
        thread::sleep(Duration::from_millis(1));
        let elapsed = timer.stop();

        assert!(elapsed >= Duration::from_millis(1));
    }

    #[test]
    fn test_clock() {
        let millis1 = Clock::millis();
        thread::sleep(Duration::from_millis(1));
        let millis2 = Clock::millis();

        assert!(millis2 > millis1);
        assert!(Clock::micros() > 0);
    }
}
