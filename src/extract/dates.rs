//! Start-date heuristics for Russian-language announcements
//!
//! Recognised forms, first match wins:
//! - `09.12.2025` (or `09/12/25`)
//! - `09.12` with the year taken from the post date
//! - `4 декабря` / `4 декабря 2025`
//!
//! A `hh:mm` shortly after the date sets the time of day. Dates without a
//! year that fall more than a week before the post are moved to next year.

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Timelike};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Genitive month names as they appear after a day number
const RU_MONTHS: [(&str, u32); 12] = [
    ("января", 1),
    ("февраля", 2),
    ("марта", 3),
    ("апреля", 4),
    ("мая", 5),
    ("июня", 6),
    ("июля", 7),
    ("августа", 8),
    ("сентября", 9),
    ("октября", 10),
    ("ноября", 11),
    ("декабря", 12),
];

/// Characters after a numeric date searched for a time of day
const NUMERIC_TIME_WINDOW: usize = 80;
/// Characters after a worded date searched for a time of day
const WORDED_TIME_WINDOW: usize = 100;

static RE_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[./](\d{1,2})[./](\d{2,4})").unwrap());
static RE_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[./](\d{1,2})").unwrap());
static RE_WORDED: LazyLock<Regex> = LazyLock::new(|| {
    let months = RU_MONTHS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(\d{{1,2}})\s+({})(?:\s+(\d{{4}}))?", months)).unwrap()
});
static RE_TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());

/// Moscow has stayed on UTC+3 without DST since 2014
pub fn moscow_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("+03:00 is a valid offset")
}

fn month_number(name: &str) -> Option<u32> {
    RU_MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// First valid `hh:mm` within `window` characters after `from`
fn time_after(text: &str, from: usize, window: usize) -> (u32, u32) {
    let tail: String = text[from..].chars().take(window).collect();
    RE_TIME
        .captures(&tail)
        .and_then(|caps| {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            (hour < 24 && minute < 60).then_some((hour, minute))
        })
        .unwrap_or((0, 0))
}

fn build(
    year: i32,
    month: u32,
    day: u32,
    (hour, minute): (u32, u32),
) -> Option<DateTime<FixedOffset>> {
    moscow_offset()
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
}

/// Moves a yearless date that already passed (by more than a week) to next year
fn roll_forward(
    candidate: DateTime<FixedOffset>,
    base: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    if candidate < base - Duration::days(7) {
        build(
            candidate.year() + 1,
            candidate.month(),
            candidate.day(),
            (candidate.hour(), candidate.minute()),
        )
    } else {
        Some(candidate)
    }
}

fn parse_full(low: &str) -> Option<DateTime<FixedOffset>> {
    let caps = RE_FULL.captures(low)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let end = caps.get(0)?.end();
    build(year, month, day, time_after(low, end, NUMERIC_TIME_WINDOW))
}

/// First `dd.mm` that is not the head of a longer `dd.mm.yy` date
fn find_short(low: &str) -> Option<Captures<'_>> {
    RE_SHORT.captures_iter(low).find(|caps| {
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let mut rest = low[end..].chars();
        !matches!(
            (rest.next(), rest.next()),
            (Some('.' | '/'), Some(c)) if c.is_ascii_digit()
        )
    })
}

fn parse_short(
    low: &str,
    caps: &Captures<'_>,
    base: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let end = caps.get(0)?.end();
    let candidate = build(base.year(), month, day, time_after(low, end, NUMERIC_TIME_WINDOW))?;
    roll_forward(candidate, base)
}

fn parse_worded(
    low: &str,
    base: Option<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    let caps = RE_WORDED.captures(low)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    let explicit_year: Option<i32> = caps.get(3).and_then(|m| m.as_str().parse().ok());
    let end = caps.get(0)?.end();
    let time = time_after(low, end, WORDED_TIME_WINDOW);
    match explicit_year {
        Some(year) => build(year, month, day, time),
        None => {
            let base = base?;
            roll_forward(build(base.year(), month, day, time)?, base)
        }
    }
}

/// Extracts the first recognisable start date from announcement text
///
/// `base` is the post's publish time; it supplies the year for dates
/// written without one. Without it such dates yield `None`, as does a
/// match whose numbers are not a real calendar date.
pub fn parse_start_datetime(
    text: &str,
    base: Option<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    let low = text.to_lowercase();

    if RE_FULL.is_match(&low) {
        return parse_full(&low);
    }
    if let Some(caps) = find_short(&low) {
        let base = base?;
        if let Some(found) = parse_short(&low, &caps, base) {
            return Some(found);
        }
    }
    parse_worded(&low, base)
}
