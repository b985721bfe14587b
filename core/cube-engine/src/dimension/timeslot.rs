//! FILENAME: core/cube-engine/src/dimension/timeslot.rs
//! Calendar periods used by time dimensions.
//!
//! A `TimeSlot` is one period at a given `Periodicity`, identified by its
//! first day. Labels look like `2010-01-15`, `2010-W01-mon`, `2010-01-W2-mon`,
//! `2010-01`, `2010-Q1`, `2010-S1`, `2010` and `all`. A full week belongs to
//! the year (and month) that contains its fourth day, which for Monday weeks
//! is the ISO-8601 rule.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{CubeError, CubeResult};

// ============================================================================
// PERIODICITY
// ============================================================================

/// First day of a week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeekStart {
    Monday,
    Sunday,
    Saturday,
}

impl WeekStart {
    pub fn suffix(&self) -> &'static str {
        match self {
            WeekStart::Monday => "mon",
            WeekStart::Sunday => "sun",
            WeekStart::Saturday => "sat",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "mon" => Some(WeekStart::Monday),
            "sun" => Some(WeekStart::Sunday),
            "sat" => Some(WeekStart::Saturday),
            _ => None,
        }
    }

    fn weekday(&self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Saturday => Weekday::Sat,
        }
    }

    /// Days elapsed since the start of the week containing `date` (0..=6).
    fn days_into_week(&self, date: NaiveDate) -> i64 {
        let day = date.weekday().num_days_from_monday() as i64;
        let start = self.weekday().num_days_from_monday() as i64;
        (day - start).rem_euclid(7)
    }
}

const WEEK_STARTS: [WeekStart; 3] = [WeekStart::Monday, WeekStart::Sunday, WeekStart::Saturday];

/// Granularity of a time dimension attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Periodicity {
    Day,
    /// Weeks cut at month boundaries.
    MonthWeek(WeekStart),
    Week(WeekStart),
    Month,
    Quarter,
    Semester,
    Year,
    All,
}

impl Periodicity {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "day" => Some(Periodicity::Day),
            "month" => Some(Periodicity::Month),
            "quarter" => Some(Periodicity::Quarter),
            "semester" => Some(Periodicity::Semester),
            "year" => Some(Periodicity::Year),
            "all" => Some(Periodicity::All),
            _ => {
                if let Some(suffix) = name.strip_prefix("month_week_") {
                    WeekStart::from_suffix(suffix).map(Periodicity::MonthWeek)
                } else if let Some(suffix) = name.strip_prefix("week_") {
                    WeekStart::from_suffix(suffix).map(Periodicity::Week)
                } else {
                    None
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Periodicity::Day => "day",
            Periodicity::MonthWeek(WeekStart::Monday) => "month_week_mon",
            Periodicity::MonthWeek(WeekStart::Sunday) => "month_week_sun",
            Periodicity::MonthWeek(WeekStart::Saturday) => "month_week_sat",
            Periodicity::Week(WeekStart::Monday) => "week_mon",
            Periodicity::Week(WeekStart::Sunday) => "week_sun",
            Periodicity::Week(WeekStart::Saturday) => "week_sat",
            Periodicity::Month => "month",
            Periodicity::Quarter => "quarter",
            Periodicity::Semester => "semester",
            Periodicity::Year => "year",
            Periodicity::All => "all",
        }
    }

    /// Every coarser periodicity this one rolls up into, finest first, `All` last.
    pub fn upper(&self) -> Vec<Periodicity> {
        use Periodicity::*;
        match self {
            Day => {
                let mut upper: Vec<Periodicity> = WEEK_STARTS.iter().map(|s| MonthWeek(*s)).collect();
                upper.extend(WEEK_STARTS.iter().map(|s| Week(*s)));
                upper.extend([Month, Quarter, Semester, Year, All]);
                upper
            }
            MonthWeek(_) | Week(_) => vec![Month, Quarter, Semester, Year, All],
            Month => vec![Quarter, Semester, Year, All],
            Quarter => vec![Semester, Year, All],
            Semester => vec![Year, All],
            Year => vec![All],
            All => vec![],
        }
    }

    /// True if `other` is this periodicity or one it rolls up into.
    pub fn rolls_up_to(&self, other: Periodicity) -> bool {
        *self == other || self.upper().contains(&other)
    }
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// TIME SLOT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSlot {
    periodicity: Periodicity,
    start: NaiveDate,
}

impl TimeSlot {
    /// The slot of the given periodicity that contains `date`.
    pub fn from_date(date: NaiveDate, periodicity: Periodicity) -> Self {
        let start = match periodicity {
            Periodicity::Day => date,
            Periodicity::MonthWeek(week_start) => {
                let week_first = date - Duration::days(week_start.days_into_week(date));
                week_first.max(month_start(date))
            }
            Periodicity::Week(week_start) => date - Duration::days(week_start.days_into_week(date)),
            Periodicity::Month => month_start(date),
            Periodicity::Quarter => first_day(date.year(), (date.month0() / 3) * 3 + 1),
            Periodicity::Semester => first_day(date.year(), (date.month0() / 6) * 6 + 1),
            Periodicity::Year => first_day(date.year(), 1),
            Periodicity::All => NaiveDate::MIN,
        };
        TimeSlot { periodicity, start }
    }

    /// Parses a slot label; the periodicity is inferred from the format.
    pub fn parse(value: &str) -> CubeResult<Self> {
        let invalid = || CubeError::InvalidTimeSlot(value.to_string());

        if value == "all" {
            return Ok(TimeSlot {
                periodicity: Periodicity::All,
                start: NaiveDate::MIN,
            });
        }

        let parts: Vec<&str> = value.split('-').collect();
        let year = parse_year(parts[0]).ok_or_else(invalid)?;

        let slot = match parts.as_slice() {
            [_] => TimeSlot {
                periodicity: Periodicity::Year,
                start: first_day(year, 1),
            },
            [_, period] => {
                if let Some(q) = period.strip_prefix('Q') {
                    let q = parse_in_range(q, 1, 4).ok_or_else(invalid)?;
                    TimeSlot {
                        periodicity: Periodicity::Quarter,
                        start: first_day(year, (q - 1) * 3 + 1),
                    }
                } else if let Some(s) = period.strip_prefix('S') {
                    let s = parse_in_range(s, 1, 2).ok_or_else(invalid)?;
                    TimeSlot {
                        periodicity: Periodicity::Semester,
                        start: first_day(year, (s - 1) * 6 + 1),
                    }
                } else {
                    let month = parse_in_range(period, 1, 12).ok_or_else(invalid)?;
                    TimeSlot {
                        periodicity: Periodicity::Month,
                        start: first_day(year, month),
                    }
                }
            }
            [_, week, suffix] if week.starts_with('W') => {
                let week_start = WeekStart::from_suffix(suffix).ok_or_else(invalid)?;
                let number = parse_in_range(&week[1..], 1, 53).ok_or_else(invalid)?;
                TimeSlot {
                    periodicity: Periodicity::Week(week_start),
                    start: first_week_start(year, week_start) + Duration::weeks(number as i64 - 1),
                }
            }
            [_, month, day] => {
                let month = parse_in_range(month, 1, 12).ok_or_else(invalid)?;
                let day = parse_in_range(day, 1, 31).ok_or_else(invalid)?;
                TimeSlot {
                    periodicity: Periodicity::Day,
                    start: NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?,
                }
            }
            [_, month, week, suffix] => {
                let month = parse_in_range(month, 1, 12).ok_or_else(invalid)?;
                let week_start = WeekStart::from_suffix(suffix).ok_or_else(invalid)?;
                let number = week
                    .strip_prefix('W')
                    .and_then(|n| parse_in_range(n, 1, 6))
                    .ok_or_else(invalid)?;
                let first = first_day(year, month);
                let start = if number == 1 {
                    first
                } else {
                    first - Duration::days(week_start.days_into_week(first))
                        + Duration::weeks(number as i64 - 1)
                };
                TimeSlot {
                    periodicity: Periodicity::MonthWeek(week_start),
                    start,
                }
            }
            _ => return Err(invalid()),
        };

        // Out-of-range week numbers and zero padding mistakes do not survive the round trip
        if slot.value() != value {
            return Err(invalid());
        }
        Ok(slot)
    }

    pub fn periodicity(&self) -> Periodicity {
        self.periodicity
    }

    pub fn first_date(&self) -> NaiveDate {
        self.start
    }

    pub fn last_date(&self) -> NaiveDate {
        let day = Duration::days(1);
        match self.periodicity {
            Periodicity::Day => self.start,
            Periodicity::MonthWeek(week_start) => {
                let week_last = self.start - Duration::days(week_start.days_into_week(self.start))
                    + Duration::days(6);
                week_last.min(add_months(month_start(self.start), 1) - day)
            }
            Periodicity::Week(_) => self.start + Duration::days(6),
            Periodicity::Month => add_months(self.start, 1) - day,
            Periodicity::Quarter => add_months(self.start, 3) - day,
            Periodicity::Semester => add_months(self.start, 6) - day,
            Periodicity::Year => add_months(self.start, 12) - day,
            Periodicity::All => NaiveDate::MAX,
        }
    }

    /// The following slot of the same periodicity.
    pub fn next(&self) -> TimeSlot {
        match self.last_date().succ_opt() {
            Some(date) if self.periodicity != Periodicity::All => {
                TimeSlot::from_date(date, self.periodicity)
            }
            _ => *self,
        }
    }

    /// The slot of a coarser periodicity this one belongs to.
    pub fn to_parent(&self, periodicity: Periodicity) -> TimeSlot {
        TimeSlot::from_date(self.anchor(), periodicity)
    }

    /// The day that decides which coarser period a slot belongs to.
    fn anchor(&self) -> NaiveDate {
        match self.periodicity {
            Periodicity::Week(_) => self.start + Duration::days(3),
            _ => self.start,
        }
    }

    pub fn value(&self) -> String {
        let date = self.start;
        match self.periodicity {
            Periodicity::Day => date.format("%Y-%m-%d").to_string(),
            Periodicity::MonthWeek(week_start) => format!(
                "{:04}-{:02}-W{}-{}",
                date.year(),
                date.month(),
                month_week_number(date, week_start),
                week_start.suffix()
            ),
            Periodicity::Week(week_start) => {
                let anchor = self.anchor();
                format!(
                    "{:04}-W{:02}-{}",
                    anchor.year(),
                    anchor.ordinal0() / 7 + 1,
                    week_start.suffix()
                )
            }
            Periodicity::Month => format!("{:04}-{:02}", date.year(), date.month()),
            Periodicity::Quarter => format!("{:04}-Q{}", date.year(), date.month0() / 3 + 1),
            Periodicity::Semester => format!("{:04}-S{}", date.year(), date.month0() / 6 + 1),
            Periodicity::Year => format!("{:04}", date.year()),
            Periodicity::All => "all".to_string(),
        }
    }

    /// English label for display.
    pub fn humanize(&self) -> String {
        let date = self.start;
        match self.periodicity {
            Periodicity::Day => date.format("%b %-d, %Y").to_string(),
            Periodicity::MonthWeek(week_start) => format!(
                "Week {} of {}",
                month_week_number(date, week_start),
                date.format("%b %Y")
            ),
            Periodicity::Week(_) => {
                let anchor = self.anchor();
                format!("Week {}, {}", anchor.ordinal0() / 7 + 1, anchor.year())
            }
            Periodicity::Month => date.format("%B %Y").to_string(),
            Periodicity::Quarter => format!("Q{} {}", date.month0() / 3 + 1, date.year()),
            Periodicity::Semester => format!("S{} {}", date.month0() / 6 + 1, date.year()),
            Periodicity::Year => date.year().to_string(),
            Periodicity::All => "All".to_string(),
        }
    }
}

// ============================================================================
// CALENDAR HELPERS
// ============================================================================

/// First day of a month. `month` is always 1..=12 at every call site.
fn first_day(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

/// Adds whole months to the first day of a month.
fn add_months(first: NaiveDate, months: u32) -> NaiveDate {
    let total = first.year() * 12 + first.month0() as i32 + months as i32;
    first_day(total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}

fn month_week_number(date: NaiveDate, week_start: WeekStart) -> i64 {
    let first = month_start(date);
    (date.day0() as i64 + week_start.days_into_week(first)) / 7 + 1
}

/// Start of week 1: the week whose fourth day is the first such weekday of the year.
fn first_week_start(year: i32, week_start: WeekStart) -> NaiveDate {
    let jan1 = first_day(year, 1);
    let anchor_offset = (3 - week_start.days_into_week(jan1)).rem_euclid(7);
    jan1 + Duration::days(anchor_offset) - Duration::days(3)
}

fn parse_year(text: &str) -> Option<i32> {
    if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn parse_in_range(text: &str, min: u32, max: u32) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|n| (min..=max).contains(n))
}
