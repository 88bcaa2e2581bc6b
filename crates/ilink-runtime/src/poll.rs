//! Adaptive poll cadence
//!
//! Polling runs at the normal interval until a write succeeds. The next two
//! ticks then run at the fast interval so the real device state is picked up
//! quickly, after which the schedule backs off again.

use std::time::Duration;

use ilink_core::DeviceConfig;

/// Fast ticks run after a write before reverting to normal polling
const FAST_TICKS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Normal,
    /// Fast polling, with the number of fast ticks already run
    Fast { ticks: u32 },
}

/// Current poll mode and the intervals it selects between
#[derive(Debug, Clone)]
pub struct PollSchedule {
    normal: Duration,
    fast: Duration,
    mode: PollMode,
}

impl PollSchedule {
    pub fn new(normal: Duration, fast: Duration) -> Self {
        Self {
            normal,
            fast,
            mode: PollMode::Normal,
        }
    }

    pub fn from_device(device: &DeviceConfig) -> Self {
        Self::new(device.normal_poll_interval(), device.fast_poll_interval())
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn is_fast(&self) -> bool {
        matches!(self.mode, PollMode::Fast { .. })
    }

    /// Time until the next tick
    pub fn interval(&self) -> Duration {
        match self.mode {
            PollMode::Normal => self.normal,
            PollMode::Fast { .. } => self.fast,
        }
    }

    /// Switch to fast polling, restarting the fast tick count
    pub fn set_fast(&mut self) {
        self.mode = PollMode::Fast { ticks: 0 };
    }

    pub fn set_normal(&mut self) {
        self.mode = PollMode::Normal;
    }

    /// Account for one poll tick, returning true if the mode changed
    pub fn record_tick(&mut self) -> bool {
        if let PollMode::Fast { ticks } = self.mode {
            let ticks = ticks + 1;
            if ticks >= FAST_TICKS {
                self.set_normal();
                return true;
            }
            self.mode = PollMode::Fast { ticks };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> PollSchedule {
        PollSchedule::new(Duration::from_secs(300), Duration::from_secs(5))
    }

    #[test]
    fn test_two_fast_ticks_after_write() {
        let mut poll = schedule();
        assert_eq!(poll.interval(), Duration::from_secs(300));

        poll.set_fast();
        assert_eq!(poll.interval(), Duration::from_secs(5));

        assert!(!poll.record_tick());
        assert_eq!(poll.interval(), Duration::from_secs(5));

        assert!(poll.record_tick());
        assert_eq!(poll.interval(), Duration::from_secs(300));
        assert_eq!(poll.mode(), PollMode::Normal);
    }

    #[test]
    fn test_set_fast_restarts_count() {
        let mut poll = schedule();
        poll.set_fast();
        poll.record_tick();
        poll.set_fast();
        assert!(!poll.record_tick());
        assert!(poll.is_fast());
    }

    #[test]
    fn test_normal_ticks_do_nothing() {
        let mut poll = schedule();
        for _ in 0..5 {
            assert!(!poll.record_tick());
        }
        assert!(!poll.is_fast());
    }
}
