//! Five-field cron expressions

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::BTreeSet;

/// A parsed `minute hour day-of-month month day-of-week` schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    /// Parse a cron expression
    pub fn parse(expression: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!("expected 5 fields, found {}", fields.len()));
        }

        let minutes = parse_field(fields[0], 0, 59, "minute")?;
        let hours = parse_field(fields[1], 0, 23, "hour")?;
        let days_of_month = parse_field(fields[2], 1, 31, "day-of-month")?;
        let months = parse_field(fields[3], 1, 12, "month")?;
        // 7 is accepted as an alias for Sunday
        let days_of_week: BTreeSet<u32> = parse_field(fields[4], 0, 7, "day-of-week")?
            .into_iter()
            .map(|d| d % 7)
            .collect();

        Ok(Self {
            expression: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            // "*/2" still counts as unrestricted, like "*"
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the schedule fires during the minute containing `at`
    pub fn matches(&self, at: &DateTime<Utc>) -> bool {
        if !self.minutes.contains(&at.minute())
            || !self.hours.contains(&at.hour())
            || !self.months.contains(&at.month())
        {
            return false;
        }

        self.day_matches(at)
    }

    /// The first minute strictly after `after` at which the schedule fires
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = truncate_to_minute(*after) + Duration::minutes(1);
        let limit = candidate + Duration::days(366);

        while candidate <= limit {
            if !self.months.contains(&candidate.month()) || !self.day_matches(&candidate) {
                // Jump to the start of the next day
                candidate = truncate_to_minute(candidate)
                    - Duration::minutes(i64::from(candidate.hour() * 60 + candidate.minute()))
                    + Duration::days(1);
                continue;
            }
            if !self.hours.contains(&candidate.hour()) {
                candidate = candidate - Duration::minutes(i64::from(candidate.minute()))
                    + Duration::hours(1);
                continue;
            }
            if self.minutes.contains(&candidate.minute()) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }

        None
    }

    fn day_matches(&self, at: &DateTime<Utc>) -> bool {
        // When both day fields are restricted, either one matching is enough
        let dom = self.days_of_month.contains(&at.day());
        let dow = self
            .days_of_week
            .contains(&at.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

/// Drop seconds and sub-second precision
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

fn parse_field(field: &str, min: u32, max: u32, name: &str) -> Result<BTreeSet<u32>, String> {
    let mut values = BTreeSet::new();

    for part in field.split(',') {
        if part.is_empty() {
            return Err(format!("empty list entry in {} field", name));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{}' in {} field", step, name))?;
                if step == 0 {
                    return Err(format!("step must be positive in {} field", name));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max, name)?, parse_value(b, min, max, name)?)
        } else {
            let v = parse_value(range, min, max, name)?;
            // `N/S` means from N to the end of the range
            if part.contains('/') {
                (v, max)
            } else {
                (v, v)
            }
        };

        if start > end {
            return Err(format!("range {}-{} is reversed in {} field", start, end, name));
        }

        values.extend((start..=end).step_by(step as usize));
    }

    Ok(values)
}

fn parse_value(raw: &str, min: u32, max: u32, name: &str) -> Result<u32, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("invalid value '{}' in {} field", raw, name))?;
    if value < min || value > max {
        return Err(format!(
            "{} out of range {}-{} in {} field",
            value, min, max, name
        ));
    }
    Ok(value)
}
