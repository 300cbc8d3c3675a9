//! When to take a checkpoint.
//!
//! K_i: interval 0 never writes, 1 writes once `delay` has passed since the
//! last write, N > 1 writes after every N completed classes.

use crate::models::CheckpointConfig;
use std::time::{Duration, Instant};

/// Decides after each completed class whether the engine should write.
#[derive(Debug, Clone)]
pub struct CheckpointSchedule {
    interval: u32,
    delay: Duration,
    classes_since_write: u32,
    last_write: Instant,
}

impl CheckpointSchedule {
    pub fn new(interval: u32, delay: Duration) -> Self {
        Self {
            interval,
            delay,
            classes_since_write: 0,
            last_write: Instant::now(),
        }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(config.interval, Duration::from_secs(config.delay_secs))
    }

    pub fn is_enabled(&self) -> bool {
        self.interval > 0
    }

    /// Record a completed class; returns whether a checkpoint is due.
    pub fn class_completed(&mut self) -> bool {
        self.class_completed_at(Instant::now())
    }

    pub fn class_completed_at(&mut self, now: Instant) -> bool {
        self.classes_since_write = self.classes_since_write.saturating_add(1);
        match self.interval {
            0 => false,
            1 => now.saturating_duration_since(self.last_write) >= self.delay,
            n => self.classes_since_write >= n,
        }
    }

    /// Reset counters after a checkpoint was taken.
    pub fn mark_written(&mut self) {
        self.mark_written_at(Instant::now());
    }

    pub fn mark_written_at(&mut self, now: Instant) {
        self.classes_since_write = 0;
        self.last_write = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_writes() {
        let mut schedule = CheckpointSchedule::new(0, Duration::ZERO);
        assert!(!schedule.is_enabled());
        for _ in 0..10 {
            assert!(!schedule.class_completed());
        }
    }

    #[test]
    fn test_timer_driven() {
        let start = Instant::now();
        let mut schedule = CheckpointSchedule::new(1, Duration::from_secs(300));
        schedule.mark_written_at(start);

        assert!(!schedule.class_completed_at(start + Duration::from_secs(10)));
        assert!(!schedule.class_completed_at(start + Duration::from_secs(299)));
        assert!(schedule.class_completed_at(start + Duration::from_secs(300)));

        schedule.mark_written_at(start + Duration::from_secs(300));
        assert!(!schedule.class_completed_at(start + Duration::from_secs(400)));
    }

    #[test]
    fn test_zero_delay_writes_every_class() {
        let mut schedule = CheckpointSchedule::new(1, Duration::ZERO);
        assert!(schedule.class_completed());
        schedule.mark_written();
        assert!(schedule.class_completed());
    }

    #[test]
    fn test_every_n_classes_ignores_delay() {
        let start = Instant::now();
        let mut schedule = CheckpointSchedule::new(3, Duration::from_secs(3600));
        schedule.mark_written_at(start);

        assert!(!schedule.class_completed_at(start));
        assert!(!schedule.class_completed_at(start));
        assert!(schedule.class_completed_at(start));

        schedule.mark_written_at(start);
        assert!(!schedule.class_completed_at(start + Duration::from_secs(7200)));
    }

    #[test]
    fn test_from_config() {
        let config = CheckpointConfig {
            interval: 5,
            ..Default::default()
        };
        let schedule = CheckpointSchedule::from_config(&config);
        assert!(schedule.is_enabled());
        assert_eq!(schedule.delay, Duration::from_secs(300));
    }
}
