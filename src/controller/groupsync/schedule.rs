use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid schedule '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Schedule '{0}' has no upcoming run")]
    NoUpcomingRun(String),
}

/// Parse a cron expression
///
/// Accepts standard five-field expressions (minute hour day-of-month month
/// day-of-week), `@daily`-style descriptors, and the six/seven-field form with
/// a leading seconds field.
pub fn parse_schedule(expression: &str) -> Result<Schedule, ScheduleError> {
    let normalized = normalize(expression);
    Schedule::from_str(&normalized).map_err(|e| ScheduleError::Parse {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Time from `now` until the next run of the schedule
///
/// The next run is strictly after `now`: when `now` is exactly a fire time,
/// the following one is returned.
pub fn next_delay(expression: &str, now: DateTime<Utc>) -> Result<Duration, ScheduleError> {
    let schedule = parse_schedule(expression)?;
    let next = schedule
        .after(&now)
        .next()
        .ok_or_else(|| ScheduleError::NoUpcomingRun(expression.to_string()))?;
    // `after` never yields `now` itself, so the difference is positive
    (next - now)
        .to_std()
        .map_err(|_| ScheduleError::NoUpcomingRun(expression.to_string()))
}

/// Rewrite a five-field expression into the seconds-first form the `cron` crate reads
///
/// Standard cron numbers days of the week 0-7 with Sunday as 0 or 7; the
/// crate numbers them 1-7 with Sunday as 1.
fn normalize(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }
    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        shift_day_of_week(fields[4])
    )
}

/// Shift numeric day-of-week values up by one, leaving step values and names alone
fn shift_day_of_week(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut digits = String::new();
    let mut after_slash = false;

    let flush = |digits: &mut String, out: &mut String, after_slash: bool| {
        if digits.is_empty() {
            return;
        }
        if after_slash {
            out.push_str(digits);
        } else {
            match digits.parse::<u32>() {
                Ok(0) | Ok(7) => out.push('1'),
                Ok(n) if n < 7 => out.push_str(&(n + 1).to_string()),
                _ => out.push_str(digits),
            }
        }
        digits.clear();
    };

    for c in field.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        flush(&mut digits, &mut out, after_slash);
        after_slash = c == '/';
        out.push(c);
    }
    flush(&mut digits, &mut out, after_slash);
    out
}
