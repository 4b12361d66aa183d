use serde::Serialize;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub datasets: usize,
    pub events: usize,
    pub flashes: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_dataset(&self, events: usize, flashes: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.datasets += 1;
            metrics.events += events;
            metrics.flashes += flashes;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let recorder = MetricsRecorder::new();
        recorder.record_dataset(120, 4);
        recorder.record_dataset(30, 1);
        recorder.record_error();
        assert_eq!(
            recorder.snapshot(),
            MetricsSnapshot {
                datasets: 2,
                events: 150,
                flashes: 5,
                errors: 1,
            }
        );
    }
}
