// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Cron scheduling boundary: `(expr, now) -> next fire timestamp | none`.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression '{0}': {1}")]
    InvalidExpression(String, String),
}

pub trait CronSchedule: Send + Sync {
    /// Next fire time strictly after `now`, or `None` if `expr` is empty
    /// (no schedule) or never fires again.
    fn next_fire_time(&self, expr: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CronError>;
}

/// Standard 6-field (`sec min hour day month weekday`) cron parser.
#[derive(Default)]
pub struct SystemCron;

impl CronSchedule for SystemCron {
    fn next_fire_time(&self, expr: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CronError> {
        if expr.trim().is_empty() {
            return Ok(None);
        }
        let schedule = cron::Schedule::from_str(expr)
            .map_err(|e| CronError::InvalidExpression(expr.to_string(), e.to_string()))?;
        Ok(schedule.after(&now).next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_expr_means_no_schedule() {
        let cron = SystemCron;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(cron.next_fire_time("", now).unwrap(), None);
    }

    #[test]
    fn every_minute_boundary_fires_next_minute() {
        let cron = SystemCron;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 30).unwrap();
        let next = cron.next_fire_time("0 * * * * *", now).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap());
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let cron = SystemCron;
        assert!(cron.next_fire_time("not a cron", Utc::now()).is_err());
    }
}
