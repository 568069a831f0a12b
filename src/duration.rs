//! Duration and timestamp parsing for job scheduling

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

const DURATION_PATTERN: &str =
    r"^\s*(?:(?P<days>\d+)d)?\s*(?:(?P<hours>\d+):(?P<minutes>\d{1,2}))?\s*$";

/// Parse `"[<d>d] [<h>:<m>]"`, e.g. `1d`, `2:30`, `1d 0:15`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let re = Regex::new(DURATION_PATTERN)?;
    let caps = re
        .captures(s)
        .with_context(|| format!("Invalid duration '{}', expected [<d>d] [<h>:<m>]", s))?;
    let field = |name: &str| -> Result<i64> {
        caps.name(name)
            .map_or(Ok(0), |m| m.as_str().parse())
            .with_context(|| format!("Duration '{}' out of range", s))
    };
    let (days, hours, minutes) = (field("days")?, field("hours")?, field("minutes")?);
    if minutes >= 60 {
        bail!("Invalid duration '{}': minutes must be below 60", s);
    }
    let total = Duration::try_days(days)
        .zip(Duration::try_hours(hours))
        .zip(Duration::try_minutes(minutes))
        .and_then(|((d, h), m)| d.checked_add(&h)?.checked_add(&m))
        .with_context(|| format!("Duration '{}' out of range", s))?;
    if total <= Duration::zero() {
        bail!("Duration '{}' must be positive", s);
    }
    Ok(total)
}

/// Parse a local `YYYY-MM-DD HH:MM` timestamp
pub fn parse_local_time(s: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M")
        .with_context(|| format!("Invalid time '{}', expected YYYY-MM-DD HH:MM", s))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("Time '{}' does not exist locally", s))?;
    Ok(local.with_timezone(&Utc))
}

/// Render a duration as `[N days, ]H:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (days, rest) = (total / 86_400, total % 86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Render a timestamp in local time
pub fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
