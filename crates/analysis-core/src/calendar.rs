use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::{AnalysisError, TradingCalendar};

/// Longest run of consecutive closed days tolerated before a calendar is considered broken.
const MAX_CLOSED_RUN_DAYS: usize = 31;

/// Monday to Friday, no holidays
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendar;

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// Weekdays minus an explicit holiday set
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }
}

impl TradingCalendar for HolidayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        WeekdayCalendar.is_trading_day(date) && !self.holidays.contains(&date)
    }
}

/// The next `count` trading days strictly after `after`.
pub fn next_trading_days(
    calendar: &dyn TradingCalendar,
    after: NaiveDate,
    count: usize,
) -> Result<Vec<NaiveDate>, AnalysisError> {
    let mut dates = Vec::with_capacity(count);
    let mut current = after;
    let mut closed_run = 0;

    while dates.len() < count {
        current = current.succ_opt().ok_or_else(|| {
            AnalysisError::InvalidParameter(format!("Date overflow after {}", current))
        })?;
        if calendar.is_trading_day(current) {
            dates.push(current);
            closed_run = 0;
        } else {
            closed_run += 1;
            if closed_run > MAX_CLOSED_RUN_DAYS {
                return Err(AnalysisError::InvalidParameter(format!(
                    "Trading calendar has no open day within {} days after {}",
                    MAX_CLOSED_RUN_DAYS, current
                )));
            }
        }
    }

    Ok(dates)
}
