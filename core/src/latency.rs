use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Round-trip timer for sent messages.
///
/// Only the most recent send is tracked. The sender does not wait for an
/// acknowledgement before the next message, so with messages in flight an
/// acknowledgement is measured against the latest start.
#[derive(Debug, Default)]
pub struct RoundTrip {
    pending: Mutex<Option<Instant>>,
}

impl RoundTrip {
    pub fn start(&self) {
        *self.pending.lock() = Some(Instant::now());
    }

    /// Elapsed time since the pending start, clearing it.
    pub fn finish(&self) -> Option<Duration> {
        self.pending.lock().take().map(|start| start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_pending() {
        let round_trip = RoundTrip::default();
        assert_eq!(round_trip.finish(), None);
    }

    #[test]
    fn reported_once() {
        let round_trip = RoundTrip::default();
        round_trip.start();
        std::thread::sleep(Duration::from_millis(2));
        let elapsed = round_trip.finish().unwrap();
        assert!(elapsed >= Duration::from_millis(2));
        assert_eq!(round_trip.finish(), None);
    }
}
