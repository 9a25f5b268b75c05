// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `DateTime`, a 64 bit tick count since the Windows epoch.

use std::fmt;
use std::io::{Read, Write};

use chrono::{Datelike, Duration, TimeZone, Timelike, Utc};

use crate::encoding::{
    read_i64, write_i64, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable,
};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = NANOS_PER_SECOND / NANOS_PER_TICK;

const MIN_YEAR: i32 = 1601;
const MAX_YEAR: i32 = 9999;

/// A date/time value. Wall-clock timestamps only appear in request and
/// response headers and the security token; deadlines use the monotonic
/// clock and never this type.
///
/// Encoded as the number of 100 nanosecond intervals since January 1, 1601.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug, Clone, Copy)]
pub struct DateTime {
    date_time: chrono::DateTime<Utc>,
}

impl SimpleBinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i64(stream, self.checked_ticks())
    }
}

impl SimpleBinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let ticks = read_i64(stream)?;
        Ok(DateTime::from_ticks(ticks) + decoding_options.client_offset)
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date_time.to_rfc3339())
    }
}

impl std::ops::Add<Duration> for DateTime {
    type Output = DateTime;

    fn add(self, rhs: Duration) -> Self::Output {
        DateTime::from(self.date_time + rhs)
    }
}

impl std::ops::Sub<DateTime> for DateTime {
    type Output = Duration;

    fn sub(self, rhs: DateTime) -> Self::Output {
        self.date_time - rhs.date_time
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(date_time: chrono::DateTime<Utc>) -> Self {
        // Clip the nanoseconds to the tick resolution.
        let nanos = (date_time.nanosecond() as i64 / NANOS_PER_TICK) * NANOS_PER_TICK;
        let date_time = date_time.with_nanosecond(nanos as u32).unwrap();
        DateTime { date_time }
    }
}

impl DateTime {
    /// The current wall-clock time.
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// The null time, i.e. the epoch. Servers treat this as "no value".
    pub fn null() -> DateTime {
        DateTime::from_ticks(0)
    }

    /// Test if this is the null time.
    pub fn is_null(&self) -> bool {
        self.checked_ticks() == 0
    }

    /// Create a date time from the number of 100 nanosecond intervals since
    /// 1601-01-01.
    pub fn from_ticks(ticks: i64) -> DateTime {
        let secs = ticks / TICKS_PER_SECOND;
        let nanos = (ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
        DateTime {
            date_time: Self::epoch() + Duration::seconds(secs) + Duration::nanoseconds(nanos),
        }
    }

    /// The number of ticks since 1601-01-01, clamped to the representable
    /// range.
    pub fn checked_ticks(&self) -> i64 {
        if self.date_time.year() < MIN_YEAR {
            return 0;
        }
        if self.date_time.year() > MAX_YEAR {
            return i64::MAX;
        }
        let delta = self.date_time - Self::epoch();
        delta.num_seconds() * TICKS_PER_SECOND
            + delta.subsec_nanos() as i64 / NANOS_PER_TICK
    }

    /// Access the inner chrono value.
    pub fn as_chrono(&self) -> &chrono::DateTime<Utc> {
        &self.date_time
    }

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn date_time_round_trip() {
        let d = DateTime::now();
        let buf = d.encode_to_vec();
        assert_eq!(buf.len(), 8);
        let mut stream = Cursor::new(buf);
        let d2 = DateTime::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn date_time_null() {
        assert!(DateTime::null().is_null());
        assert!(!DateTime::now().is_null());
        assert_eq!(DateTime::from_ticks(0), DateTime::null());
    }

    #[test]
    fn date_time_ticks() {
        let d = DateTime::from_ticks(1_000_000);
        assert_eq!(d.checked_ticks(), 1_000_000);
    }
}
