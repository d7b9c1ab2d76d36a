use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Calendar coordinates of a daily analytics bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub year: i32,
    /// Zero-based month.
    pub month: u32,
    /// One-based week of month, weeks starting on Sunday.
    pub week: u32,
    /// 0 = Sunday.
    pub weekday: u32,
}

impl CalendarDay {
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month0(),
            week: week_of_month(at),
            weekday: at.weekday().num_days_from_sunday(),
        }
    }

    pub fn today() -> Self {
        Self::of(Utc::now())
    }
}

/// Week of month where the first partial week is week 1 and weeks start on Sunday.
pub fn week_of_month(at: DateTime<Utc>) -> u32 {
    let first_weekday = at
        .with_day(1)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0);
    (at.day0() + first_weekday) / 7 + 1
}

/// Number of Sunday-start weeks touched by the month of `at`.
pub fn weeks_in_month(at: DateTime<Utc>) -> u32 {
    let (year, month) = (at.year(), at.month());
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .and_then(|last| last.and_hms_opt(0, 0, 0))
        .map(|last| last.and_utc());
    last.map_or(1, week_of_month)
}
