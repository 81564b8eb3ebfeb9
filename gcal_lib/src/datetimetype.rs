use anyhow::Error;
use core::marker::PhantomData;
use derive_more::{Deref, From, Into};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error as DeError, Unexpected, Visitor},
    ser,
};
use stack_string::StackString;
use std::fmt;
use time::{
    Date, OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339,
    macros::format_description,
};

/// RFC3339 timestamp as used by the `dateTime` fields of the calendar API,
/// normalized to UTC on parse.
#[derive(Debug, Clone, Copy, Deref, Into, From, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTimeType(OffsetDateTime);

impl fmt::Display for DateTimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        if let Ok(s) = convert_datetime_to_str(self.0) {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

impl Serialize for DateTimeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&convert_datetime_to_str(self.0).map_err(ser::Error::custom)?)
    }
}

impl<'de> Deserialize<'de> for DateTimeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(DateTimeTypeVisitor(PhantomData))
    }
}

struct DateTimeTypeVisitor(PhantomData<*const DateTimeType>);

impl Visitor<'_> for DateTimeTypeVisitor {
    type Value = DateTimeType;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("rfc3339 datetime")
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        self.visit_str(&v)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        convert_str_to_datetime(v)
            .map_err(DeError::custom)
            .map(DateTimeType)
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        match std::str::from_utf8(v) {
            Ok(s) => self.visit_str(s),
            Err(_) => Err(DeError::invalid_value(Unexpected::Bytes(v), &self)),
        }
    }
}

/// # Errors
/// Returns error if formatting fails (which can only happen if formatting
/// string is non-utf8)
pub fn convert_datetime_to_str(datetime: OffsetDateTime) -> Result<StackString, Error> {
    datetime
        .format(&Rfc3339)
        .map_err(Into::into)
        .map(|s| s.replace('Z', "+00:00"))
        .map(Into::into)
}

/// # Errors
/// Return error if the string is not valid rfc3339
pub fn convert_str_to_datetime(s: &str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::parse(&s.replace('Z', "+00:00"), &Rfc3339)
        .map(|x| x.to_offset(UtcOffset::UTC))
        .map_err(Into::into)
}

/// Parse the `date` field of an all-day event (`YYYY-MM-DD`).
/// # Errors
/// Return error if the string is not a calendar date
pub fn convert_str_to_date(s: &str) -> Result<Date, Error> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).map_err(Into::into)
}
