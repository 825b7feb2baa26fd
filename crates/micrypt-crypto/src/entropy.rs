//! Entropy collector: folds user pointer-motion events together with the
//! operating-system CSPRNG into a 32-byte seed.
//!
//! The seed never replaces OS randomness; it is committed into the KDF salt
//! so a weak user contribution can only add entropy, not remove it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use micrypt_core::{VaultError, VaultResult};
use sha2::{Digest, Sha256};

use crate::secure::random_array;

/// Minimum number of motion events before a seed may be produced.
pub const MIN_ENTROPY_EVENTS: usize = 500;

/// Minimum collection duration before a seed may be produced.
pub const MIN_ENTROPY_DURATION: Duration = Duration::from_secs(15);

struct CollectorState {
    events: Vec<u8>,
    count: usize,
    start: Instant,
}

/// Thread-safe entropy pool. Event ingestion may race UI rendering, so all
/// operations serialize on an internal mutex.
pub struct EntropyCollector {
    state: Mutex<CollectorState>,
}

impl EntropyCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState {
                events: Vec::with_capacity(MIN_ENTROPY_EVENTS * 16),
                count: 0,
                start: Instant::now(),
            }),
        }
    }

    /// Record one pointer-motion sample. Events past the threshold are
    /// dropped; the pool is bounded.
    pub fn add_event(&self, x: i32, y: i32, timestamp_ns: i64) {
        let mut state = self.state.lock().expect("entropy mutex");
        if state.count >= MIN_ENTROPY_EVENTS {
            return;
        }

        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&x.to_le_bytes());
        buf[4..8].copy_from_slice(&y.to_le_bytes());
        buf[8..16].copy_from_slice(&timestamp_ns.to_le_bytes());

        state.events.extend_from_slice(&buf);
        state.count += 1;
    }

    /// Collection progress in `[0, 1]`: the minimum of event progress and
    /// elapsed-time progress.
    pub fn progress(&self) -> f64 {
        let state = self.state.lock().expect("entropy mutex");

        let event_progress = (state.count as f64 / MIN_ENTROPY_EVENTS as f64).min(1.0);
        let time_progress = (state.start.elapsed().as_secs_f64()
            / MIN_ENTROPY_DURATION.as_secs_f64())
        .min(1.0);

        event_progress.min(time_progress)
    }

    pub fn is_complete(&self) -> bool {
        let state = self.state.lock().expect("entropy mutex");
        state.count >= MIN_ENTROPY_EVENTS && state.start.elapsed() >= MIN_ENTROPY_DURATION
    }

    /// Produce `SHA-256(events ∥ os_random_32)`. Fails until both the event
    /// and time thresholds are met.
    pub fn generate_seed(&self) -> VaultResult<[u8; 32]> {
        let state = self.state.lock().expect("entropy mutex");
        if state.count < MIN_ENTROPY_EVENTS || state.start.elapsed() < MIN_ENTROPY_DURATION {
            return Err(VaultError::state("insufficient entropy collected"));
        }

        let mut hasher = Sha256::new();
        hasher.update(&state.events);
        hasher.update(random_array::<32>()?);

        Ok(hasher.finalize().into())
    }

    /// Discard all collected events and restart the clock.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("entropy mutex");
        crate::secure::wipe(&mut state.events);
        state.events.clear();
        state.count = 0;
        state.start = Instant::now();
    }
}

impl Default for EntropyCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_collector() -> EntropyCollector {
        let collector = EntropyCollector::new();
        for i in 0..MIN_ENTROPY_EVENTS as i32 {
            collector.add_event(i, i * 2, i as i64 * 1_000);
        }
        collector
    }

    #[test]
    fn test_progress_starts_at_zero() {
        let collector = EntropyCollector::new();
        assert_eq!(collector.progress(), 0.0);
        assert!(!collector.is_complete());
    }

    #[test]
    fn test_progress_is_bounded_by_time() {
        let collector = filled_collector();
        // All events are in, but the 15 s window has not elapsed.
        assert!(collector.progress() < 1.0);
        assert!(!collector.is_complete());
    }

    #[test]
    fn test_seed_requires_both_thresholds() {
        let collector = filled_collector();
        let err = collector.generate_seed().unwrap_err();
        assert_eq!(err.kind(), micrypt_core::ErrorKind::StateError);
    }

    #[test]
    fn test_events_past_threshold_are_dropped() {
        let collector = filled_collector();
        let len_before = collector.state.lock().unwrap().events.len();
        collector.add_event(1, 2, 3);
        let state = collector.state.lock().unwrap();
        assert_eq!(state.events.len(), len_before);
        assert_eq!(state.count, MIN_ENTROPY_EVENTS);
    }

    #[test]
    fn test_reset_clears_pool() {
        let collector = filled_collector();
        collector.reset();
        let state = collector.state.lock().unwrap();
        assert_eq!(state.count, 0);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_seed_after_backdated_start() {
        let collector = filled_collector();
        // Backdate the clock instead of sleeping through the window.
        collector.state.lock().unwrap().start = Instant::now() - MIN_ENTROPY_DURATION;
        assert!(collector.is_complete());
        let a = collector.generate_seed().unwrap();
        let b = collector.generate_seed().unwrap();
        // The OS randomness mixed in makes every seed unique.
        assert_ne!(a, b);
    }
}
