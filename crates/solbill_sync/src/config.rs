//! Engine configuration.

use std::time::Duration;

/// Tunables for the sync engine and its background driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Interval between background connectivity checks and drain attempts.
    pub probe_interval: Duration,
    /// Maximum number of event records retained by the event sink.
    pub event_retention: usize,
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            probe_interval: Duration::from_secs(60),
            event_retention: 1000,
        }
    }

    /// Sets the interval between background probe-and-drain ticks.
    #[must_use]
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets the event sink retention.
    #[must_use]
    pub fn with_event_retention(mut self, retention: usize) -> Self {
        self.event_retention = retention;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.probe_interval, Duration::from_secs(60));
        assert_eq!(config.event_retention, 1000);
    }

    #[test]
    fn builders_override() {
        let config = EngineConfig::new()
            .with_probe_interval(Duration::from_millis(50))
            .with_event_retention(10);
        assert_eq!(config.probe_interval, Duration::from_millis(50));
        assert_eq!(config.event_retention, 10);
    }
}
