use anyhow::{Error, format_err};
use derive_more::Into;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt, ops::Deref, str::FromStr};
use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{
    Offset, PrimitiveDateTimeExt, TimeZone as TzTimeZone, Tz,
    timezones::{db::UTC, get_by_name},
};

use stack_string::StackString;

/// IANA zone, serialized by name.
#[derive(Into, Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(into = "StackString", try_from = "StackString")]
pub struct TimeZone(&'static Tz);

impl TimeZone {
    #[must_use]
    pub fn utc() -> Self {
        Self(UTC)
    }

    /// Start of `date` in this zone, as a UTC instant. A midnight skipped by
    /// a DST jump uses the offset in effect at that UTC instant.
    #[must_use]
    pub fn local_midnight(self, date: Date) -> OffsetDateTime {
        let midnight = date.midnight();
        midnight
            .assume_timezone(self.0)
            .take_first()
            .unwrap_or_else(|| {
                let offset = self.0.get_offset_utc(&midnight.assume_utc()).to_utc();
                midnight.assume_offset(offset)
            })
            .to_offset(UtcOffset::UTC)
    }
}

impl Deref for TimeZone {
    type Target = Tz;
    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

impl From<TimeZone> for String {
    fn from(item: TimeZone) -> Self {
        item.0.name().to_string()
    }
}

impl From<TimeZone> for StackString {
    fn from(item: TimeZone) -> Self {
        item.0.name().into()
    }
}

impl FromStr for TimeZone {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        get_by_name(s)
            .map(Self)
            .ok_or_else(|| format_err!("{s} is not a valid timezone"))
    }
}

impl TryFrom<&str> for TimeZone {
    type Error = Error;
    fn try_from(item: &str) -> Result<Self, Self::Error> {
        item.parse()
    }
}

impl TryFrom<StackString> for TimeZone {
    type Error = Error;
    fn try_from(item: StackString) -> Result<Self, Self::Error> {
        item.as_str().parse()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Error;
    use time::macros::{date, datetime};

    use crate::timezone::TimeZone;

    #[test]
    fn test_timezone_parse_and_display() -> Result<(), Error> {
        let tz: TimeZone = "America/New_York".parse()?;
        assert_eq!(tz.to_string(), "America/New_York");
        assert!("Mars/Olympus_Mons".parse::<TimeZone>().is_err());
        let tz: TimeZone = serde_json::from_str(r#""Europe/Berlin""#)?;
        assert_eq!(serde_json::to_string(&tz)?, r#""Europe/Berlin""#);
        Ok(())
    }

    #[test]
    fn test_local_midnight() -> Result<(), Error> {
        let tz: TimeZone = "America/New_York".parse()?;
        assert_eq!(
            tz.local_midnight(date!(2024 - 01 - 15)),
            datetime!(2024-01-15 05:00:00 UTC)
        );
        assert_eq!(
            tz.local_midnight(date!(2024 - 07 - 15)),
            datetime!(2024-07-15 04:00:00 UTC)
        );
        assert_eq!(
            TimeZone::utc().local_midnight(date!(2024 - 07 - 15)),
            datetime!(2024-07-15 00:00:00 UTC)
        );
        Ok(())
    }
}
