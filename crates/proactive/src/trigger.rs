//! Task scheduling predicates — spec.md §4.9's
//! `trigger∈{interval(seconds), time_of_day("HH:MM"), weekly("DAY HH:MM"), cron-like}`.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use cron::Schedule;

#[derive(Debug, Clone)]
pub enum Trigger {
    Interval(Duration),
    /// `"HH:MM"`, fires once per day at that UTC time.
    TimeOfDay(String),
    /// `"DAY HH:MM"` (e.g. `"MON 09:00"`), fires once per week.
    Weekly(String),
    /// A standard five/six-field cron expression.
    CronLike(String),
}

fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn parse_weekly(s: &str) -> Option<(Weekday, NaiveTime)> {
    let (day, time) = s.split_once(' ')?;
    let weekday = match day.to_uppercase().as_str() {
        "MON" => Weekday::Mon,
        "TUE" => Weekday::Tue,
        "WED" => Weekday::Wed,
        "THU" => Weekday::Thu,
        "FRI" => Weekday::Fri,
        "SAT" => Weekday::Sat,
        "SUN" => Weekday::Sun,
        _ => return None,
    };
    Some((weekday, parse_time_of_day(time)?))
}

/// Most recent occurrence of `time` on or before `now` (same UTC day if
/// `now`'s time-of-day is past `time`, otherwise yesterday).
fn last_daily_occurrence(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(time));
    if today <= now {
        today
    } else {
        today - chrono::Duration::days(1)
    }
}

fn next_daily_occurrence(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(time));
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

fn last_weekly_occurrence(now: DateTime<Utc>, weekday: Weekday, time: NaiveTime) -> DateTime<Utc> {
    let mut candidate = last_daily_occurrence(now, time);
    while candidate.weekday() != weekday {
        candidate -= chrono::Duration::days(1);
    }
    candidate
}

fn next_weekly_occurrence(now: DateTime<Utc>, weekday: Weekday, time: NaiveTime) -> DateTime<Utc> {
    let mut candidate = next_daily_occurrence(now, time);
    // next_daily_occurrence may already be today if `time` hasn't passed.
    loop {
        if candidate.weekday() == weekday && candidate > now {
            return candidate;
        }
        candidate += chrono::Duration::days(1);
    }
}

impl Trigger {
    pub fn is_due(&self, now: DateTime<Utc>, last_run: Option<DateTime<Utc>>) -> bool {
        match self {
            Trigger::Interval(d) => match last_run {
                None => true,
                Some(lr) => (now - lr).to_std().unwrap_or(Duration::ZERO) >= *d,
            },
            Trigger::TimeOfDay(s) => {
                let Some(time) = parse_time_of_day(s) else { return false };
                let scheduled = last_daily_occurrence(now, time);
                last_run.is_none_or(|lr| lr < scheduled)
            }
            Trigger::Weekly(s) => {
                let Some((weekday, time)) = parse_weekly(s) else { return false };
                let scheduled = last_weekly_occurrence(now, weekday, time);
                last_run.is_none_or(|lr| lr < scheduled)
            }
            Trigger::CronLike(expr) => {
                let Ok(schedule) = Schedule::from_str(expr) else { return false };
                match last_run {
                    None => true,
                    Some(lr) => schedule.after(&lr).next().is_some_and(|next| next <= now),
                }
            }
        }
    }

    pub fn next_due(&self, now: DateTime<Utc>, last_run: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval(d) => {
                let chrono_d = chrono::Duration::from_std(*d).ok()?;
                Some(last_run.map(|lr| lr + chrono_d).unwrap_or(now))
            }
            Trigger::TimeOfDay(s) => Some(next_daily_occurrence(now, parse_time_of_day(s)?)),
            Trigger::Weekly(s) => {
                let (weekday, time) = parse_weekly(s)?;
                Some(next_weekly_occurrence(now, weekday, time))
            }
            Trigger::CronLike(expr) => {
                let schedule = Schedule::from_str(expr).ok()?;
                schedule.after(&now).next()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn interval_never_run_is_due() {
        let t = Trigger::Interval(Duration::from_secs(300));
        assert!(t.is_due(Utc::now(), None));
    }

    #[test]
    fn interval_not_due_before_elapsed() {
        let t = Trigger::Interval(Duration::from_secs(300));
        let now = Utc::now();
        assert!(!t.is_due(now, Some(now - ChronoDuration::seconds(60))));
    }

    #[test]
    fn interval_due_after_elapsed() {
        let t = Trigger::Interval(Duration::from_secs(300));
        let now = Utc::now();
        assert!(t.is_due(now, Some(now - ChronoDuration::seconds(301))));
    }

    #[test]
    fn time_of_day_due_once_per_day() {
        let t = Trigger::TimeOfDay("08:00".to_string());
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        assert!(t.is_due(now, None));
        let scheduled_today = Utc.with_ymd_and_hms(2026, 7, 28, 8, 0, 0).unwrap();
        assert!(!t.is_due(now, Some(scheduled_today)));
    }

    #[test]
    fn weekly_fires_on_matching_weekday() {
        let t = Trigger::Weekly("MON 09:00".to_string());
        // 2026-07-27 is a Monday.
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 10, 0, 0).unwrap();
        assert!(t.is_due(now, None));
        let last_monday = Utc.with_ymd_and_hms(2026, 7, 20, 9, 0, 0).unwrap();
        assert!(t.is_due(now, Some(last_monday)));
        let this_monday = Utc.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap();
        assert!(!t.is_due(now, Some(this_monday)));
    }

    #[test]
    fn cron_like_next_due_after_last_run() {
        let t = Trigger::CronLike("0 0 * * * * *".to_string());
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 30).unwrap();
        let last_run = Utc.with_ymd_and_hms(2026, 7, 28, 11, 0, 0).unwrap();
        assert!(t.is_due(now, Some(last_run)));
    }
}
