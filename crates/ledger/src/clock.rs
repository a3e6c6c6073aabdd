//! Business-day bucketing.
//!
//! Branches close their day on local time, not on the server's clock. The
//! timezone is configuration; it defaults to UTC only when nothing is set.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{LedgerError, ResultLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusinessClock {
    tz: Tz,
}

impl Default for BusinessClock {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl BusinessClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Builds a clock from an IANA timezone name such as
    /// `America/Argentina/Buenos_Aires`.
    pub fn from_name(name: &str) -> ResultLedger<Self> {
        let tz = name
            .trim()
            .parse::<Tz>()
            .map_err(|_| LedgerError::InvalidTimezone(name.to_string()))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Business day `at` falls into.
    pub fn business_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// Today's business day.
    pub fn today(&self) -> NaiveDate {
        self.business_day(self.now())
    }

    /// UTC instant at which `day` starts in local time.
    pub fn day_start(&self, day: NaiveDate) -> ResultLedger<DateTime<Utc>> {
        // A DST jump can skip local midnight; the day then starts at the
        // first local instant that exists.
        for hour in 0..3 {
            let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                continue;
            };
            if let Some(start) = self.tz.from_local_datetime(&day.and_time(time)).earliest() {
                return Ok(start.with_timezone(&Utc));
            }
        }
        Err(LedgerError::InvalidTimezone(format!(
            "no local start for {day} in {}",
            self.tz.name()
        )))
    }

    /// `[start, end)` of `day` in UTC.
    pub fn day_bounds(&self, day: NaiveDate) -> ResultLedger<(DateTime<Utc>, DateTime<Utc>)> {
        let next = day
            .succ_opt()
            .ok_or_else(|| LedgerError::InvalidAmount(format!("no day after {day}")))?;
        Ok((self.day_start(day)?, self.day_start(next)?))
    }

    /// Timestamp for an entry that must fall inside `day`: now, or the last
    /// second of the day when the day is already over.
    pub(crate) fn stamp_within(&self, day: NaiveDate) -> ResultLedger<DateTime<Utc>> {
        let (_, end) = self.day_bounds(day)?;
        Ok(self.now().min(end - Duration::seconds(1)))
    }
}
