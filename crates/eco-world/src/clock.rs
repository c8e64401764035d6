//! Step counter and day/night clock.

use serde::{Deserialize, Serialize};

/// Monotonic count of executed steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounter {
    current: u64,
}

impl StepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn increment(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

/// Day/night phase and the hour shown to the user.
///
/// The phase toggles every `day_length_steps` steps; the hour is derived from
/// the step number so that a full day/night cycle covers 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayClock {
    is_night: bool,
    start_hour: u64,
    hour: u64,
    day_length_steps: u64,
}

impl DayClock {
    pub fn new(start_at_night: bool, day_length_steps: u64) -> Self {
        let start_hour = if start_at_night { 18 } else { 6 };
        Self {
            is_night: start_at_night,
            start_hour,
            hour: start_hour,
            day_length_steps: day_length_steps.max(1),
        }
    }

    pub fn is_night(&self) -> bool {
        self.is_night
    }

    pub fn hour(&self) -> u64 {
        self.hour
    }

    /// Advance to `step`, the number of the step now being executed.
    pub fn advance(&mut self, step: u64) {
        if step != 0 && (step + 1) % self.day_length_steps == 0 {
            self.is_night = !self.is_night;
        }
        self.hour = (self.start_hour + step * 12 / self.day_length_steps) % 24;
    }

    /// e.g. `"Day (06:00)"`
    pub fn time_string(&self) -> String {
        let phase = if self.is_night { "Night" } else { "Day" };
        format!("{} ({:02}:00)", phase, self.hour)
    }
}
