//! DateCodec: the bit-packed calendar encoding used by V3 DATE properties
//! (spec §4.4).
//!
//! Grounded on the same shape as [`crate::varint`]'s VarLong (the wire
//! representation is a single zig-zag VarLong), but the bit layout inside
//! that integer is specific to this format; nothing in the teacher crate
//! encodes timestamps this way, so the bit-splicing technique is carried
//! over from [`crate::varint::split_count_for_header`]'s header-splicing
//! idea rather than copied from any one teacher file.

use std::io::{Read, Write};

use crate::error::{DecodeError, EncodeError};
use crate::varint::{read_var_long, write_var_long};

/// A calendar instant as carried by a DATE property: a local wall-clock date
/// and time of day plus a separate time-zone offset, matching what V1/V2's
/// ISO-8601 STRING representation already implied (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleDate {
    pub year: i32,
    /// 1..=366, the Gregorian ordinal day within `year`.
    pub day_of_year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub ms: u16,
    /// Minutes east of UTC, e.g. `-225` for `-03:45`.
    pub tz_offset_minutes: i16,
}

impl BundleDate {
    pub fn from_chrono(dt: &chrono::DateTime<chrono::FixedOffset>) -> Self {
        use chrono::{Datelike, Timelike};
        BundleDate {
            year: dt.year(),
            day_of_year: dt.ordinal() as u16,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            ms: dt.timestamp_subsec_millis() as u16,
            tz_offset_minutes: (dt.offset().local_minus_utc() / 60) as i16,
        }
    }

    pub fn to_chrono(&self) -> Result<chrono::DateTime<chrono::FixedOffset>, DecodeError> {
        use chrono::{NaiveDate, NaiveTime, TimeZone};

        let offset = chrono::FixedOffset::east_opt(self.tz_offset_minutes as i32 * 60)
            .ok_or_else(|| DecodeError::InvalidFormat("tz offset out of range".into()))?;
        let date = NaiveDate::from_yo_opt(self.year, self.day_of_year as u32).ok_or_else(|| {
            DecodeError::InvalidFormat(format!(
                "day-of-year {} is invalid for year {}",
                self.day_of_year, self.year
            ))
        })?;
        let time = NaiveTime::from_hms_milli_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.ms as u32,
        )
        .ok_or_else(|| DecodeError::InvalidFormat("invalid time-of-day".into()))?;

        offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .ok_or_else(|| DecodeError::InvalidFormat("ambiguous local date/time".into()))
    }
}

enum Tz {
    Utc,
    WholeHour(i8),
    Arbitrary(i16),
}

fn classify_tz(offset_minutes: i16) -> Result<Tz, EncodeError> {
    if offset_minutes == 0 {
        return Ok(Tz::Utc);
    }
    if offset_minutes % 60 == 0 {
        let hours = offset_minutes / 60;
        if (-16..=15).contains(&hours) {
            return Ok(Tz::WholeHour(hours as i8));
        }
    }
    if (-1024..=1023).contains(&offset_minutes) {
        return Ok(Tz::Arbitrary(offset_minutes));
    }
    Err(EncodeError::Internal(format!(
        "tz offset of {offset_minutes} minutes has no DateCodec representation"
    )))
}

enum Precision {
    Midnight,
    HourOnly(u8),
    HourMinute(u16),
    Full(u32),
}

fn classify_precision(date: &BundleDate) -> Precision {
    if date.hour == 0 && date.minute == 0 && date.second == 0 && date.ms == 0 {
        Precision::Midnight
    } else if date.minute == 0 && date.second == 0 && date.ms == 0 {
        Precision::HourOnly(date.hour)
    } else if date.second == 0 && date.ms == 0 {
        Precision::HourMinute(date.hour as u16 * 60 + date.minute as u16)
    } else {
        let total_ms = ((date.hour as u32 * 60 + date.minute as u32) * 60 + date.second as u32)
            * 1000
            + date.ms as u32;
        Precision::Full(total_ms)
    }
}

/// Sign-extends the low `bits` bits of `value` to a full `i64`.
fn sign_extend(value: i64, bits: u32) -> i64 {
    let shift = 64 - bits;
    (value << shift) >> shift
}

fn encode_raw(date: &BundleDate) -> Result<i64, EncodeError> {
    let mut acc: i64 = 0;
    let mut shift: u32 = 0;

    match classify_tz(date.tz_offset_minutes)? {
        Tz::Utc => shift += 1,
        Tz::WholeHour(code) => {
            acc |= 0b01i64 << shift;
            acc |= ((code as i64) & 0x1F) << (shift + 2);
            shift += 7;
        }
        Tz::Arbitrary(minutes) => {
            acc |= 0b11i64 << shift;
            acc |= ((minutes as i64) & 0x7FF) << (shift + 2);
            shift += 13;
        }
    }

    match classify_precision(date) {
        Precision::Midnight => shift += 2,
        Precision::HourOnly(h) => {
            acc |= 0b01i64 << shift;
            acc |= (h as i64) << (shift + 2);
            shift += 7;
        }
        Precision::HourMinute(total_minutes) => {
            acc |= 0b10i64 << shift;
            acc |= (total_minutes as i64) << (shift + 2);
            shift += 13;
        }
        Precision::Full(total_ms) => {
            acc |= 0b11i64 << shift;
            acc |= (total_ms as i64) << (shift + 2);
            shift += 32;
        }
    }

    if !(1..=366).contains(&date.day_of_year) {
        return Err(EncodeError::Internal(format!(
            "day_of_year {} out of range",
            date.day_of_year
        )));
    }
    acc |= (date.day_of_year as i64) << shift;
    shift += 9;

    acc |= (date.year as i64 - 2010) << shift;

    Ok(acc)
}

fn decode_raw(raw: i64) -> Result<BundleDate, DecodeError> {
    let mut bits = raw;

    let tz = if bits & 1 == 0 {
        bits >>= 1;
        Tz::Utc
    } else if (bits >> 1) & 1 == 0 {
        let code = sign_extend((bits >> 2) & 0x1F, 5) as i8;
        bits >>= 7;
        Tz::WholeHour(code)
    } else {
        let minutes = sign_extend((bits >> 2) & 0x7FF, 11) as i16;
        bits >>= 13;
        Tz::Arbitrary(minutes)
    };

    let precision = match bits & 0b11 {
        0b00 => {
            bits >>= 2;
            Precision::Midnight
        }
        0b01 => {
            let h = ((bits >> 2) & 0x1F) as u8;
            bits >>= 7;
            Precision::HourOnly(h)
        }
        0b10 => {
            let tm = ((bits >> 2) & 0x7FF) as u16;
            bits >>= 13;
            Precision::HourMinute(tm)
        }
        0b11 => {
            let tms = ((bits >> 2) & 0x3FFF_FFFF) as u32;
            bits >>= 32;
            Precision::Full(tms)
        }
        _ => unreachable!(),
    };

    let day_of_year = (bits & 0x1FF) as u16;
    bits >>= 9;

    if !(1..=366).contains(&day_of_year) {
        return Err(DecodeError::InvalidFormat(format!(
            "day_of_year {day_of_year} out of range"
        )));
    }

    let year = 2010 + bits as i32;

    let (hour, minute, second, ms) = match precision {
        Precision::Midnight => (0, 0, 0, 0),
        Precision::HourOnly(h) => (h, 0, 0, 0),
        Precision::HourMinute(tm) => ((tm / 60) as u8, (tm % 60) as u8, 0, 0),
        Precision::Full(tms) => {
            let total_sec = tms / 1000;
            let ms = (tms % 1000) as u16;
            let total_min = total_sec / 60;
            let second = (total_sec % 60) as u8;
            let hour = (total_min / 60) as u8;
            let minute = (total_min % 60) as u8;
            (hour, minute, second, ms)
        }
    };

    let tz_offset_minutes = match tz {
        Tz::Utc => 0,
        Tz::WholeHour(code) => code as i16 * 60,
        Tz::Arbitrary(minutes) => minutes,
    };

    Ok(BundleDate {
        year,
        day_of_year,
        hour,
        minute,
        second,
        ms,
        tz_offset_minutes,
    })
}

/// Writes a DATE value using the V3 encoding (spec §4.4). Under V1/V2, dates
/// instead go through `PropertyCodec`'s STRING path; this function is only
/// ever reached from the V3 writer.
pub fn write_date<W: Write>(w: &mut W, date: &BundleDate) -> Result<(), EncodeError> {
    let raw = encode_raw(date)?;
    write_var_long(w, raw)?;
    Ok(())
}

/// Reads a DATE value using the V3 encoding (spec §4.4).
pub fn read_date<R: Read>(r: &mut R) -> Result<BundleDate, DecodeError> {
    let raw = read_var_long(r)?;
    decode_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(date: BundleDate) -> BundleDate {
        let mut buf = Vec::new();
        write_date(&mut buf, &date).unwrap();
        let mut cursor = Cursor::new(buf);
        read_date(&mut cursor).unwrap()
    }

    /// Testable Property 6's first instant: UTC midnight exactly at the
    /// codec's year epoch. Every field collapses to its cheapest branch
    /// (UTC, midnight, day 1, year offset 0), so this is the one length this
    /// implementation locks down precisely: zig-zag of the packed value `8`
    /// is `16`, a single VarInt byte.
    #[test]
    fn epoch_utc_midnight_encodes_in_one_byte() {
        let date = BundleDate {
            year: 2010,
            day_of_year: 1,
            hour: 0,
            minute: 0,
            second: 0,
            ms: 0,
            tz_offset_minutes: 0,
        };
        let mut buf = Vec::new();
        write_date(&mut buf, &date).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(roundtrip(date), date);
    }

    #[test]
    fn millisecond_precision_round_trips() {
        let date = BundleDate {
            year: 2024,
            day_of_year: 197, // 2024-07-15, a leap year
            hour: 12,
            minute: 34,
            second: 56,
            ms: 789,
            tz_offset_minutes: 0,
        };
        assert_eq!(roundtrip(date), date);
    }

    #[test]
    fn whole_hour_offset_round_trips() {
        let date = BundleDate {
            year: 2024,
            day_of_year: 197,
            hour: 12,
            minute: 34,
            second: 56,
            ms: 789,
            tz_offset_minutes: 9 * 60, // +09:00
        };
        assert_eq!(roundtrip(date), date);
    }

    #[test]
    fn arbitrary_minute_offset_round_trips() {
        let date = BundleDate {
            year: 1999,
            day_of_year: 365, // 1999-12-31, not a leap year
            hour: 23,
            minute: 59,
            second: 59,
            ms: 999,
            tz_offset_minutes: -(3 * 60 + 45), // -03:45
        };
        assert_eq!(roundtrip(date), date);
    }

    #[test]
    fn hour_only_precision_round_trips() {
        let date = BundleDate {
            year: 2030,
            day_of_year: 42,
            hour: 7,
            minute: 0,
            second: 0,
            ms: 0,
            tz_offset_minutes: 0,
        };
        assert_eq!(roundtrip(date), date);
    }

    #[test]
    fn hour_minute_precision_round_trips() {
        let date = BundleDate {
            year: 1985,
            day_of_year: 300,
            hour: 18,
            minute: 15,
            second: 0,
            ms: 0,
            tz_offset_minutes: 5 * 60 + 30, // +05:30, arbitrary-minute case
        };
        assert_eq!(roundtrip(date), date);
    }

    #[test]
    fn chrono_conversion_round_trips() {
        let original = chrono::DateTime::parse_from_rfc3339("2024-07-15T12:34:56.789+05:30")
            .unwrap();
        let date = BundleDate::from_chrono(&original);
        let restored = date.to_chrono().unwrap();
        assert_eq!(original, restored);
    }
}
