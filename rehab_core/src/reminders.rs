//! Daily reminder planning.
//!
//! The planner only computes the reminder list from configuration; actual
//! delivery belongs to whatever notification service the front end has.

use crate::config::{Config, ReminderConfig};
use crate::Result;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub enabled: bool,
    pub time: NaiveTime,
}

#[derive(Clone, Debug, Default)]
pub struct ReminderPlanner {
    reminders: Vec<Reminder>,
}

impl ReminderPlanner {
    /// Build from configured reminders, sorted by time of day
    ///
    /// Fails on a malformed `HH:MM` time.
    pub fn new(configured: &[ReminderConfig]) -> Result<Self> {
        let mut reminders = configured
            .iter()
            .map(|r| {
                Ok(Reminder {
                    enabled: r.enabled,
                    time: r.time_of_day()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        reminders.sort_by_key(|r| r.time);
        reminders.dedup();

        tracing::debug!("Planned {} reminders", reminders.len());
        Ok(Self { reminders })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.reminders)
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Reminder> {
        self.reminders.iter().filter(|r| r.enabled)
    }

    /// The first enabled reminder strictly after `now`, rolling over to tomorrow
    pub fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let today = now.date();
        self.enabled()
            .map(|r| today.and_time(r.time))
            .find(|at| *at > now)
            .or_else(|| {
                self.enabled()
                    .next()
                    .map(|r| (today + Duration::days(1)).and_time(r.time))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reminder(time: &str, enabled: bool) -> ReminderConfig {
        ReminderConfig {
            enabled,
            time: time.into(),
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_default_config_reminders() {
        let planner = ReminderPlanner::from_config(&Config::default()).unwrap();
        assert_eq!(planner.reminders().len(), 2);
        assert_eq!(planner.enabled().count(), 1);
    }

    #[test]
    fn test_sorted_by_time() {
        let planner =
            ReminderPlanner::new(&[reminder("18:30", true), reminder("07:15", true)]).unwrap();
        let times: Vec<String> = planner
            .reminders()
            .iter()
            .map(|r| r.time.format("%H:%M").to_string())
            .collect();
        assert_eq!(times, vec!["07:15", "18:30"]);
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(ReminderPlanner::new(&[reminder("25:00", true)]).is_err());
        assert!(ReminderPlanner::new(&[reminder("noon", true)]).is_err());
    }

    #[test]
    fn test_next_after_skips_disabled_and_rolls_over() {
        let planner = ReminderPlanner::new(&[
            reminder("09:00", true),
            reminder("12:00", false),
            reminder("18:30", true),
        ])
        .unwrap();

        assert_eq!(planner.next_after(at(10, 8, 0)), Some(at(10, 9, 0)));
        assert_eq!(planner.next_after(at(10, 9, 0)), Some(at(10, 18, 30)));
        assert_eq!(planner.next_after(at(10, 20, 0)), Some(at(11, 9, 0)));
    }

    #[test]
    fn test_no_enabled_reminders() {
        let planner = ReminderPlanner::new(&[reminder("09:00", false)]).unwrap();
        assert_eq!(planner.next_after(at(10, 8, 0)), None);
    }
}
