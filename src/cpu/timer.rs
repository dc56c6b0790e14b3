//! Wall-clock driven timer rate.
//!
//! Instructions run as fast as the host allows; DT and ST count down at a
//! fixed frequency instead. Every cycle asks the clock whether a period has
//! elapsed since the last tick and ticks at most once, so missed periods are
//! dropped rather than replayed.

/// Default timer frequency in Hz.
pub const DEFAULT_TIMER_HZ: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerClock {
    period_ms: u64,
    last_tick: Option<u64>,
}

impl TimerClock {
    /// Integer period: 60 Hz gives 16 ms.
    pub fn new(hz: u32) -> Self {
        Self {
            period_ms: 1000 / u64::from(hz.max(1)),
            last_tick: None,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Forget the last tick; the next check only starts the clock.
    pub fn restart(&mut self) {
        self.last_tick = None;
    }

    /// Returns true when the timers should count down now.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        match self.last_tick {
            None => {
                self.last_tick = Some(now_ms);
                false
            }
            Some(last) if now_ms.saturating_sub(last) >= self.period_ms => {
                self.last_tick = Some(now_ms);
                true
            }
            Some(_) => false,
        }
    }
}

impl Default for TimerClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMER_HZ)
    }
}
