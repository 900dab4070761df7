use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use tokio::time::sleep;

/// A parsed cron expression.
///
/// Classic five-field expressions (`*/5 * * * *`) are accepted and run at
/// second zero of every matching minute. Their day-of-week field uses classic
/// numbering (0 or 7 is Sunday) and is translated to the `cron` crate's
/// (1 is Sunday).
#[derive(Clone, Debug)]
pub struct ScheduleSpec {
    expression: String,
    schedule: Schedule,
}

impl ScheduleSpec {
    pub fn parse(expression: &str) -> Result<Self, ValidationError> {
        let expression = expression.trim();
        let invalid = |reason: String| ValidationError::InvalidSchedule {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalized = if let &[minute, hour, day, month, weekday] = fields.as_slice() {
            let weekday = classic_days_of_week(weekday).map_err(invalid)?;
            format!("0 {minute} {hour} {day} {month} {weekday}")
        } else {
            expression.to_string()
        };

        let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;

        Ok(ScheduleSpec {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The expression as the operator wrote it.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Rewrites a classic day-of-week field as an explicit list in the `cron`
/// crate's numbering (Sunday = 1 .. Saturday = 7).
fn classic_days_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => (range, step),
                _ => return Err(format!("invalid step in day of week {item:?}")),
            },
            None => (item, 1),
        };

        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (classic_day(start)?, classic_day(end)?),
            // `n/step` runs from n to the end of the week.
            None if step > 1 => {
                let day = classic_day(range)?;
                (day, day.max(6))
            }
            None => {
                let day = classic_day(range)?;
                (day, day)
            }
        };
        if start > end {
            return Err(format!("day of week range {range:?} runs backwards"));
        }

        for day in (start..=end).step_by(step) {
            days[day % 7] = true;
        }
    }

    Ok(days
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(day, _)| (day + 1).to_string())
        .collect::<Vec<_>>()
        .join(","))
}

fn classic_day(token: &str) -> Result<usize, String> {
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

    if let Ok(day) = token.parse::<usize>() {
        return if day <= 7 {
            Ok(day)
        } else {
            Err(format!("day of week {day} is outside 0-7"))
        };
    }
    NAMES
        .iter()
        .position(|name| token.eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown day of week {token:?}"))
}

/// Fires a callback at every occurrence of a schedule.
pub struct CronScheduler {
    spec: ScheduleSpec,
}

impl CronScheduler {
    pub fn new(spec: ScheduleSpec) -> Self {
        CronScheduler { spec }
    }

    /// Runs until the schedule has no further occurrences or the future is
    /// dropped. Each tick runs on its own task, so a slow or panicking tick
    /// never delays or stops the next one.
    pub async fn run<F, Fut>(&self, mut tick: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            let now = Utc::now();
            let Some(next) = self.spec.next_after(now) else {
                tracing::warn!(
                    schedule = self.spec.expression(),
                    "Schedule has no future occurrences, stopping scheduler"
                );
                return;
            };

            tracing::debug!(next_run = %next, "Waiting for next scheduled tick");
            sleep((next - now).to_std().unwrap_or_default()).await;

            let handle = tokio::spawn(tick());
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    tracing::error!("Scheduled tick panicked: {e}");
                }
            });
        }
    }
}
