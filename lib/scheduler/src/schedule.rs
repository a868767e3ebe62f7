//! Cron-based recurrence rules.

use crate::error::ScheduleError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use serde::{Deserialize, Serialize};

/// A cron recurrence evaluated in an optional IANA timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    /// The cron expression (5 fields, or 6 with leading seconds).
    pub expression: String,
    /// Timezone for evaluation; UTC when absent.
    pub timezone: Option<String>,
}

impl CronSchedule {
    /// Creates a new cron schedule.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            timezone: None,
        }
    }

    /// Sets the timezone.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    fn cron(&self) -> Result<Cron, ScheduleError> {
        Cron::new(&self.expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| ScheduleError::InvalidCronExpression {
                expression: self.expression.clone(),
                reason: e.to_string(),
            })
    }

    fn tz(&self) -> Result<Tz, ScheduleError> {
        match &self.timezone {
            None => Ok(Tz::UTC),
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ScheduleError::InvalidTimezone {
                    timezone: name.clone(),
                }),
        }
    }

    /// Validates the cron expression and timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if either is invalid.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.cron()?;
        self.tz()?;
        Ok(())
    }

    /// Calculates the first execution time strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule is invalid or has no future
    /// occurrence.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let cron = self.cron()?;
        let local = after.with_timezone(&self.tz()?);

        cron.find_next_occurrence(&local, false)
            .map(|next| next.with_timezone(&Utc))
            .map_err(|e| ScheduleError::EvaluationFailed {
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cron_schedule_creation() {
        let schedule = CronSchedule::new("0 7 * * *").with_timezone("America/New_York");

        assert_eq!(schedule.expression, "0 7 * * *");
        assert_eq!(schedule.timezone, Some("America/New_York".to_string()));
    }

    #[test]
    fn cron_schedule_validation() {
        assert!(CronSchedule::new("0 7 * * *").validate().is_ok());
        assert!(CronSchedule::new("invalid").validate().is_err());
        assert!(matches!(
            CronSchedule::new("0 7 * * *")
                .with_timezone("Not/AZone")
                .validate(),
            Err(ScheduleError::InvalidTimezone { .. })
        ));
    }

    #[test]
    fn next_after_in_utc() {
        let schedule = CronSchedule::new("0 8 * * *");
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn next_after_respects_timezone() {
        // 08:00 in Oslo is 07:00 UTC in winter.
        let schedule = CronSchedule::new("0 8 * * *").with_timezone("Europe/Oslo");
        let after = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();

        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 10, 7, 0, 0).unwrap());
    }

    #[test]
    fn next_after_is_exclusive() {
        let schedule = CronSchedule::new("0 8 * * *");
        let exactly = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

        let next = schedule.next_after(exactly).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
    }
}
