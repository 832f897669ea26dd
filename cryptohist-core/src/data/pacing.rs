//! Blocking pauses between requests.
//!
//! Every sleep in the pipeline (retry backoff, rate-limit cooldown, the fixed
//! inter-coin delay) goes through [`Pacer`] so tests can record pauses instead
//! of waiting them out.

use std::sync::Mutex;
use std::time::Duration;

/// Something that can block the current thread for a duration.
pub trait Pacer {
    fn pause(&self, duration: Duration);
}

/// Production pacer: `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Pacer that records requested pauses without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pauses requested so far, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Number of pauses equal to `duration`.
    pub fn count_of(&self, duration: Duration) -> usize {
        self.pauses().iter().filter(|d| **d == duration).count()
    }

    /// Sum of all requested pauses.
    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

impl<T: Pacer + ?Sized> Pacer for &T {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}
