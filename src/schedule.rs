//! When automatic refreshes are allowed to fire.
//!
//! The scheduler never reads the clock; callers pass the current time in.

use jiff::Zoned;
use jiff::civil::Weekday;

/// Weekdays and an hour range `[start_hour, end_hour)` in local time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWindow {
    pub weekdays: Vec<Weekday>,
    pub start_hour: i8,
    pub end_hour: i8,
}

impl Default for ActiveWindow {
    fn default() -> Self {
        Self {
            weekdays: vec![
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
                Weekday::Thursday,
                Weekday::Friday,
            ],
            start_hour: 9,
            end_hour: 18,
        }
    }
}

impl ActiveWindow {
    pub fn contains(&self, now: &Zoned) -> bool {
        self.weekdays.contains(&now.weekday())
            && (self.start_hour..self.end_hour).contains(&now.hour())
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    window: ActiveWindow,
    every_hours: i8,
    last_fired: Option<Zoned>,
}

impl Scheduler {
    /// `every_hours` is clamped to at least 1
    pub fn new(window: ActiveWindow, every_hours: i8) -> Self {
        Self {
            window,
            every_hours: every_hours.max(1),
            last_fired: None,
        }
    }

    pub fn window(&self) -> &ActiveWindow {
        &self.window
    }

    pub fn last_fired(&self) -> Option<&Zoned> {
        self.last_fired.as_ref()
    }

    /// Whether to refresh right after process start
    pub fn should_fire_on_start(&mut self, now: &Zoned) -> bool {
        if !self.window.contains(now) {
            return false;
        }
        self.last_fired = Some(now.clone());
        true
    }

    /// Whether the periodic refresh is due. Fires at most once per hour that
    /// is a multiple of `every_hours`, and only inside the active window.
    pub fn should_fire_now(&mut self, now: &Zoned) -> bool {
        if !self.window.contains(now) || now.hour() % self.every_hours != 0 {
            return false;
        }
        if self
            .last_fired
            .as_ref()
            .is_some_and(|last| last.date() == now.date() && last.hour() == now.hour())
        {
            return false;
        }
        self.last_fired = Some(now.clone());
        true
    }
}
