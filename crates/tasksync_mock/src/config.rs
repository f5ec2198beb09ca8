//! Mock server configuration.

use rand::Rng;
use std::time::Duration;

/// Configuration for the mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct MockConfig {
    /// Artificial latency range applied to requests that are not failed
    /// early. `None` answers immediately.
    pub latency: Option<(Duration, Duration)>,
}

impl MockConfig {
    /// Creates a configuration that answers without delay.
    pub fn instant() -> Self {
        Self { latency: None }
    }

    /// Sets the latency range. A `max` below `min` is raised to `min`.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = Some((min, max.max(min)));
        self
    }

    /// Picks the delay for one request.
    pub fn sample_latency(&self) -> Duration {
        match self.latency {
            None => Duration::ZERO,
            Some((min, max)) if min == max => min,
            Some((min, max)) => {
                let min_ms = min.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
            }
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self::instant().with_latency(Duration::from_millis(250), Duration::from_millis(500))
    }
}
