//! Due-date and due-time shorthands accepted by the CLI and MCP tools.

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveTime, Weekday};

use crate::model::parse_clock_time;

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolve `today`, `tomorrow`, `+3d`/`+2w`/`+1m`, a weekday name or `YYYY-MM-DD`
/// relative to `today`.
pub fn parse_due_date(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Date specification cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        _ => {}
    }

    if lower.starts_with('+') {
        return parse_relative(&lower, today);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return Ok(today + Duration::days(days_ahead));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow!(
        "Unrecognized date '{}'. Try YYYY-MM-DD, today, tomorrow, +3d, mon",
        spec
    ))
}

pub fn parse_due_time(spec: &str) -> Result<NaiveTime> {
    parse_clock_time(spec.trim())
        .ok_or_else(|| anyhow!("Unrecognized time '{}'. Use HH:MM", spec))
}

fn parse_relative(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let body = spec.strip_prefix('+').unwrap_or(spec);
    let (number_part, unit) = match body.char_indices().next_back() {
        Some((split, _)) if split > 0 => body.split_at(split),
        _ => return Err(anyhow!("Relative date '{}' is too short", spec)),
    };
    let value: u32 = number_part.parse().context("Invalid relative offset")?;
    let resolved = match unit {
        "d" => today.checked_add_signed(Duration::days(value.into())),
        "w" => today.checked_add_signed(Duration::weeks(value.into())),
        "m" => today.checked_add_months(Months::new(value)),
        other => {
            return Err(anyhow!(
                "Unsupported relative unit '{}'. Use d, w, or m.",
                other
            ))
        }
    };
    resolved.ok_or_else(|| anyhow!("Relative date '{}' is out of range", spec))
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
