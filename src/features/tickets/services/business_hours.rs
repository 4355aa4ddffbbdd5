use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, Utc, Weekday};

use crate::core::config::SlaConfig;

/// Working calendar for business-hours deadline arithmetic: a daily window
/// plus the set of active weekdays.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub days: Vec<Weekday>,
}

impl BusinessCalendar {
    pub fn new(start: NaiveTime, end: NaiveTime, days: Vec<Weekday>) -> Self {
        Self { start, end, days }
    }

    pub fn from_config(config: &SlaConfig) -> Self {
        Self::new(
            config.business_hours_start,
            config.business_hours_end,
            config.business_days.clone(),
        )
    }

    fn is_business_day(&self, weekday: Weekday) -> bool {
        self.days.contains(&weekday)
    }
}

/// Add `hours` of working time to `start`, advancing a cursor through the
/// calendar's daily windows.
///
/// A requirement that lands exactly at end-of-business is satisfied without
/// crossing into the next day. A degenerate calendar (end not after start)
/// falls back to plain calendar-hour addition.
pub fn add_business_hours(
    start: DateTime<Utc>,
    hours: f64,
    calendar: &BusinessCalendar,
) -> DateTime<Utc> {
    let daily_window_ms = (calendar.end - calendar.start).num_milliseconds();
    if daily_window_ms <= 0 {
        return start + hours_duration(hours);
    }

    let mut remaining_ms = (hours * 3_600_000.0).round() as i64;
    let mut current = start;

    while remaining_ms > 0 {
        if !calendar.is_business_day(current.weekday()) {
            current = next_day_start(current, calendar);
            continue;
        }

        // Before the window: snap forward to start-of-business.
        if current.time() < calendar.start {
            current = day_start(current, calendar);
        }

        // At or past the window: continue tomorrow.
        if current.time() >= calendar.end {
            current = next_day_start(current, calendar);
            continue;
        }

        let end_of_day = current.date_naive().and_time(calendar.end).and_utc();
        let available_ms = (end_of_day - current).num_milliseconds();

        if remaining_ms <= available_ms {
            current += Duration::milliseconds(remaining_ms);
            remaining_ms = 0;
        } else {
            remaining_ms -= available_ms;
            current = next_day_start(current, calendar);
        }
    }

    current
}

pub fn hours_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

fn day_start(at: DateTime<Utc>, calendar: &BusinessCalendar) -> DateTime<Utc> {
    at.date_naive().and_time(calendar.start).and_utc()
}

fn next_day_start(at: DateTime<Utc>, calendar: &BusinessCalendar) -> DateTime<Utc> {
    (at.date_naive() + Days::new(1))
        .and_time(calendar.start)
        .and_utc()
}
