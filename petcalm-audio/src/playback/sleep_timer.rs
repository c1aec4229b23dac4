//! Sleep timer countdown
//!
//! Minute granularity. The engine drives `tick()` from a one-minute
//! interval; the timer itself holds no clock so it can be stepped
//! deterministically.

use super::state::SleepTimerState;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Selectable countdown lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepTimerPreset {
    Off,
    #[serde(rename = "15")]
    Minutes15,
    #[serde(rename = "30")]
    Minutes30,
    #[serde(rename = "60")]
    Minutes60,
}

impl SleepTimerPreset {
    pub fn minutes(&self) -> Option<u32> {
        match self {
            SleepTimerPreset::Off => None,
            SleepTimerPreset::Minutes15 => Some(15),
            SleepTimerPreset::Minutes30 => Some(30),
            SleepTimerPreset::Minutes60 => Some(60),
        }
    }

    /// Map a UI selection (`None` = off) onto a preset
    pub fn from_minutes(minutes: Option<u32>) -> Result<Self> {
        match minutes {
            None | Some(0) => Ok(SleepTimerPreset::Off),
            Some(15) => Ok(SleepTimerPreset::Minutes15),
            Some(30) => Ok(SleepTimerPreset::Minutes30),
            Some(60) => Ok(SleepTimerPreset::Minutes60),
            Some(other) => Err(Error::Common(petcalm_common::Error::InvalidInput(format!(
                "Unsupported sleep timer value: {} minutes",
                other
            )))),
        }
    }
}

/// Result of one countdown step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Timer is off; nothing happened
    Inactive,
    /// Minutes left after this tick
    Remaining(u32),
    /// Countdown reached zero; the timer is now off
    Elapsed,
}

#[derive(Debug, Default)]
pub struct SleepTimer {
    remaining: Option<u32>,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any countdown in flight and start the new one
    pub fn set(&mut self, preset: SleepTimerPreset) -> SleepTimerState {
        self.remaining = preset.minutes();
        match self.remaining {
            Some(minutes) => info!("Sleep timer set: {} minutes", minutes),
            None => info!("Sleep timer off"),
        }
        self.state()
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    /// Advance the countdown by one minute
    pub fn tick(&mut self) -> TimerTick {
        let Some(remaining) = self.remaining else {
            return TimerTick::Inactive;
        };

        let left = remaining.saturating_sub(1);
        if left == 0 {
            self.remaining = None;
            info!("Sleep timer elapsed");
            TimerTick::Elapsed
        } else {
            self.remaining = Some(left);
            debug!("Sleep timer: {} minutes remaining", left);
            TimerTick::Remaining(left)
        }
    }

    pub fn state(&self) -> SleepTimerState {
        SleepTimerState {
            remaining_minutes: self.remaining,
            active: self.remaining.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifteen_ticks_elapse_once() {
        let mut timer = SleepTimer::new();
        timer.set(SleepTimerPreset::Minutes15);

        for expected in (1..15).rev() {
            assert_eq!(timer.tick(), TimerTick::Remaining(expected));
        }
        assert_eq!(timer.tick(), TimerTick::Elapsed);
        assert_eq!(
            timer.state(),
            SleepTimerState {
                remaining_minutes: None,
                active: false
            }
        );
        assert_eq!(timer.tick(), TimerTick::Inactive);
    }

    #[test]
    fn test_set_restarts_countdown() {
        let mut timer = SleepTimer::new();
        timer.set(SleepTimerPreset::Minutes60);
        timer.tick();
        timer.tick();
        assert_eq!(timer.state().remaining_minutes, Some(58));

        let state = timer.set(SleepTimerPreset::Minutes30);
        assert_eq!(state.remaining_minutes, Some(30));
        assert!(state.active);
    }

    #[test]
    fn test_off_cancels() {
        let mut timer = SleepTimer::new();
        timer.set(SleepTimerPreset::Minutes15);
        let state = timer.set(SleepTimerPreset::Off);
        assert!(!state.active);
        assert_eq!(timer.tick(), TimerTick::Inactive);
    }

    #[test]
    fn test_from_minutes() {
        assert_eq!(SleepTimerPreset::from_minutes(None).unwrap(), SleepTimerPreset::Off);
        assert_eq!(
            SleepTimerPreset::from_minutes(Some(30)).unwrap(),
            SleepTimerPreset::Minutes30
        );
        assert!(SleepTimerPreset::from_minutes(Some(45)).is_err());
    }
}
