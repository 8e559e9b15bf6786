//! Sampling frequency — parsed calendar step used to timestamp forecasts.
//!
//! Purpose
//! -------
//! Turn the configuration's frequency alias (`"D"`, `"7D"`, `"MS"`, ...)
//! into a typed [`SamplingFrequency`] and generate the timestamps that
//! follow a series' last observation.
//!
//! Key behaviors
//! -------------
//! - Accepted aliases: `T`/`min` (minute), `H`/`h` (hour), `D` (day),
//!   `B` (business day), `W` (week, anchored on Sunday), `MS` (month
//!   start), `M` (month end), `QS`/`Q` (quarter start/end, calendar
//!   quarters), `AS`/`YS` (year start), `A`/`Y` (year end). Each may be
//!   prefixed by a positive multiplier (`"15T"`, `"2W"`).
//! - [`SamplingFrequency::advance`] reproduces `date_range(ts, k + 1)[k]`:
//!   anchored frequencies first roll `ts` forward onto their grid (no-op
//!   when already on it), then step `k` times.
//!
//! Invariants & assumptions
//! ------------------------
//! - The multiplier is ≥ 1.
//! - The time-of-day of the start timestamp is preserved by every step.
//!
//! Conventions
//! -----------
//! - Calendar arithmetic is done with `chrono` naive types; no time zones.
//! - Overflow of the calendar is reported as `None`.
use crate::esrnn::errors::{ConfigError, ConfigResult};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use std::fmt;
use std::str::FromStr;

/// Base unit of a sampling frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    BusinessDay,
    Week,
    MonthStart,
    MonthEnd,
    QuarterStart,
    QuarterEnd,
    YearStart,
    YearEnd,
}

impl FrequencyUnit {
    fn from_alias(alias: &str) -> Option<Self> {
        let unit = match alias {
            "T" | "min" => FrequencyUnit::Minute,
            "H" | "h" => FrequencyUnit::Hour,
            "D" => FrequencyUnit::Day,
            "B" => FrequencyUnit::BusinessDay,
            "W" => FrequencyUnit::Week,
            "MS" => FrequencyUnit::MonthStart,
            "M" => FrequencyUnit::MonthEnd,
            "QS" => FrequencyUnit::QuarterStart,
            "Q" => FrequencyUnit::QuarterEnd,
            "AS" | "YS" => FrequencyUnit::YearStart,
            "A" | "Y" => FrequencyUnit::YearEnd,
            _ => return None,
        };
        Some(unit)
    }

    fn alias(self) -> &'static str {
        match self {
            FrequencyUnit::Minute => "T",
            FrequencyUnit::Hour => "H",
            FrequencyUnit::Day => "D",
            FrequencyUnit::BusinessDay => "B",
            FrequencyUnit::Week => "W",
            FrequencyUnit::MonthStart => "MS",
            FrequencyUnit::MonthEnd => "M",
            FrequencyUnit::QuarterStart => "QS",
            FrequencyUnit::QuarterEnd => "Q",
            FrequencyUnit::YearStart => "AS",
            FrequencyUnit::YearEnd => "A",
        }
    }
}

/// SamplingFrequency — multiplier plus calendar unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingFrequency {
    pub multiple: u32,
    pub unit: FrequencyUnit,
}

impl SamplingFrequency {
    /// Parse a frequency alias with an optional positive multiplier.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidFrequency`] for an empty string, a zero or
    ///   unparsable multiplier, or an unknown alias.
    pub fn parse(alias: &str) -> ConfigResult<Self> {
        let trimmed = alias.trim();
        let split = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len());
        let (digits, unit_alias) = trimmed.split_at(split);
        if unit_alias.is_empty() {
            return Err(ConfigError::InvalidFrequency {
                alias: alias.to_string(),
                reason: "Missing frequency unit.",
            });
        }
        let multiple = if digits.is_empty() {
            1
        } else {
            digits.parse::<u32>().map_err(|_| ConfigError::InvalidFrequency {
                alias: alias.to_string(),
                reason: "Multiplier is not a valid integer.",
            })?
        };
        if multiple == 0 {
            return Err(ConfigError::InvalidFrequency {
                alias: alias.to_string(),
                reason: "Multiplier must be positive.",
            });
        }
        let unit = FrequencyUnit::from_alias(unit_alias).ok_or_else(|| {
            ConfigError::InvalidFrequency { alias: alias.to_string(), reason: "Unknown alias." }
        })?;
        Ok(Self { multiple, unit })
    }

    /// Return the `k`-th timestamp of the grid starting at `ts`.
    ///
    /// `advance(ts, 0)` is `ts` rolled onto the grid; forecasts use
    /// `advance(last, 1..=h)`.
    ///
    /// Returns `None` when the calendar overflows.
    pub fn advance(&self, ts: NaiveDateTime, k: usize) -> Option<NaiveDateTime> {
        let steps = i64::try_from(k).ok()?.checked_mul(i64::from(self.multiple))?;
        match self.unit {
            FrequencyUnit::Minute => ts.checked_add_signed(Duration::minutes(steps)),
            FrequencyUnit::Hour => ts.checked_add_signed(Duration::hours(steps)),
            FrequencyUnit::Day => ts.checked_add_signed(Duration::days(steps)),
            FrequencyUnit::Week => {
                let start = roll_to_weekday(ts, Weekday::Sun)?;
                start.checked_add_signed(Duration::weeks(steps))
            }
            FrequencyUnit::BusinessDay => {
                let mut cur = roll_to_business_day(ts)?;
                for _ in 0..steps {
                    cur = roll_to_business_day(cur.checked_add_signed(Duration::days(1))?)?;
                }
                Some(cur)
            }
            FrequencyUnit::MonthStart => step_months(ts, steps, 1, Anchor::Start),
            FrequencyUnit::MonthEnd => step_months(ts, steps, 1, Anchor::End),
            FrequencyUnit::QuarterStart => step_months(ts, steps, 3, Anchor::Start),
            FrequencyUnit::QuarterEnd => step_months(ts, steps, 3, Anchor::End),
            FrequencyUnit::YearStart => step_months(ts, steps, 12, Anchor::Start),
            FrequencyUnit::YearEnd => step_months(ts, steps, 12, Anchor::End),
        }
    }

    /// The `h` timestamps strictly after `ts`: `advance(ts, 1..=h)`.
    pub fn horizon(&self, ts: NaiveDateTime, h: usize) -> Option<Vec<NaiveDateTime>> {
        (1..=h).map(|k| self.advance(ts, k)).collect()
    }
}

impl FromStr for SamplingFrequency {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SamplingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiple == 1 {
            write!(f, "{}", self.unit.alias())
        } else {
            write!(f, "{}{}", self.multiple, self.unit.alias())
        }
    }
}

#[derive(Clone, Copy)]
enum Anchor {
    Start,
    End,
}

fn roll_to_weekday(ts: NaiveDateTime, target: Weekday) -> Option<NaiveDateTime> {
    let current = ts.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let delta = (wanted - current).rem_euclid(7);
    ts.checked_add_signed(Duration::days(delta))
}

fn roll_to_business_day(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    match ts.weekday() {
        Weekday::Sat => ts.checked_add_signed(Duration::days(2)),
        Weekday::Sun => ts.checked_add_signed(Duration::days(1)),
        _ => Some(ts),
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt().map(|d| d.day())
}

/// Anchor date of the period (of `span` months) containing month index
/// `months` counted from year 0.
fn anchor_date(months: i64, span: i64, anchor: Anchor) -> Option<NaiveDate> {
    let month_index = match anchor {
        Anchor::Start => months.div_euclid(span) * span,
        Anchor::End => months.div_euclid(span) * span + span - 1,
    };
    let year = i32::try_from(month_index.div_euclid(12)).ok()?;
    let month = u32::try_from(month_index.rem_euclid(12) + 1).ok()?;
    let day = match anchor {
        Anchor::Start => 1,
        Anchor::End => last_day_of_month(year, month)?,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Roll `ts` onto the month/quarter/year grid, then move `steps` periods.
fn step_months(ts: NaiveDateTime, steps: i64, span: i64, anchor: Anchor) -> Option<NaiveDateTime> {
    let months = i64::from(ts.year()) * 12 + i64::from(ts.month0());
    let mut period = months.div_euclid(span);
    // Off-grid starts roll forward to the next anchor.
    if anchor_date(period * span, span, anchor)? < ts.date() {
        period += 1;
    }
    let target = period.checked_add(steps)?.checked_mul(span)?;
    let date = anchor_date(target, span, anchor)?;
    Some(date.and_time(ts.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Alias parsing (with and without multipliers), rejection of bad aliases,
    // and calendar stepping for tick and anchored frequencies.
    // -------------------------------------------------------------------------

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Aliases and multipliers parse into the expected unit.
    //
    // Given
    // -----
    // - "D", "7D", "min", "QS", "YS".
    //
    // Expect
    // ------
    // - Matching units and multipliers; Display round-trips the canonical alias.
    fn parse_accepts_aliases_with_multipliers() {
        let f = SamplingFrequency::parse("7D").unwrap();
        assert_eq!(f, SamplingFrequency { multiple: 7, unit: FrequencyUnit::Day });
        assert_eq!(f.to_string(), "7D");
        assert_eq!(SamplingFrequency::parse("min").unwrap().unit, FrequencyUnit::Minute);
        assert_eq!(SamplingFrequency::parse("QS").unwrap().unit, FrequencyUnit::QuarterStart);
        assert_eq!(SamplingFrequency::parse("YS").unwrap().unit, FrequencyUnit::YearStart);
        assert_eq!("D".parse::<SamplingFrequency>().unwrap().to_string(), "D");
    }

    #[test]
    // Purpose
    // -------
    // Unknown aliases, zero multipliers, and bare numbers are rejected.
    //
    // Given
    // -----
    // - "X", "0D", "12", "".
    //
    // Expect
    // ------
    // - `ConfigError::InvalidFrequency` for each.
    fn parse_rejects_invalid_aliases() {
        for bad in ["X", "0D", "12", ""] {
            assert!(
                matches!(SamplingFrequency::parse(bad), Err(ConfigError::InvalidFrequency { .. })),
                "alias {bad:?} should fail"
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // Daily and hourly frequencies step by fixed durations.
    //
    // Given
    // -----
    // - 2020-02-27 with "D" and "6H".
    //
    // Expect
    // ------
    // - Daily steps cross the leap day; 6H steps add 6 hours each.
    fn tick_frequencies_add_fixed_durations() {
        let d = SamplingFrequency::parse("D").unwrap();
        let dates = d.horizon(at(2020, 2, 27), 3).unwrap();
        assert_eq!(dates, vec![at(2020, 2, 28), at(2020, 2, 29), at(2020, 3, 1)]);

        let h = SamplingFrequency::parse("6H").unwrap();
        let next = h.advance(at(2020, 1, 1), 2).unwrap();
        assert_eq!(next, at(2020, 1, 1) + Duration::hours(12));
    }

    #[test]
    // Purpose
    // -------
    // Month-end and month-start frequencies follow the anchored grid.
    //
    // Given
    // -----
    // - Month end starting on 2021-01-31 (on grid) and on 2021-01-15 (off grid).
    // - Month start starting on 2021-01-01.
    //
    // Expect
    // ------
    // - On-grid start steps to Feb 28 / Mar 31; off-grid start first rolls
    //   to Jan 31; month start steps to Feb 1 / Mar 1.
    fn anchored_month_frequencies_follow_the_grid() {
        let m = SamplingFrequency::parse("M").unwrap();
        assert_eq!(m.horizon(at(2021, 1, 31), 2).unwrap(), vec![at(2021, 2, 28), at(2021, 3, 31)]);
        assert_eq!(m.advance(at(2021, 1, 15), 0).unwrap(), at(2021, 1, 31));
        assert_eq!(m.advance(at(2021, 1, 15), 1).unwrap(), at(2021, 2, 28));

        let ms = SamplingFrequency::parse("MS").unwrap();
        assert_eq!(ms.horizon(at(2021, 1, 1), 2).unwrap(), vec![at(2021, 2, 1), at(2021, 3, 1)]);
    }

    #[test]
    fn quarter_and_year_frequencies_use_calendar_periods() {
        let q = SamplingFrequency::parse("Q").unwrap();
        assert_eq!(q.advance(at(2021, 3, 31), 1).unwrap(), at(2021, 6, 30));
        let qs = SamplingFrequency::parse("QS").unwrap();
        assert_eq!(qs.advance(at(2021, 10, 1), 1).unwrap(), at(2022, 1, 1));
        let a = SamplingFrequency::parse("A").unwrap();
        assert_eq!(a.advance(at(2019, 12, 31), 1).unwrap(), at(2020, 12, 31));
        let ys = SamplingFrequency::parse("YS").unwrap();
        assert_eq!(ys.advance(at(2019, 1, 1), 2).unwrap(), at(2021, 1, 1));
    }

    #[test]
    // Purpose
    // -------
    // Business days skip weekends and weekly steps land on Sundays.
    //
    // Given
    // -----
    // - Friday 2021-01-08 with "B"; Sunday 2021-01-10 with "W".
    //
    // Expect
    // ------
    // - Next business day is Monday 2021-01-11; next week is 2021-01-17.
    fn business_day_and_week_frequencies() {
        let b = SamplingFrequency::parse("B").unwrap();
        assert_eq!(b.advance(at(2021, 1, 8), 1).unwrap(), at(2021, 1, 11));
        assert_eq!(b.advance(at(2021, 1, 8), 2).unwrap(), at(2021, 1, 12));
        let w = SamplingFrequency::parse("W").unwrap();
        assert_eq!(w.advance(at(2021, 1, 10), 1).unwrap(), at(2021, 1, 17));
    }
}
