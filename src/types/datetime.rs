use std::fmt::{self, Display, Formatter};

use bytes::Buf;
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::error::Error;
use crate::type_info::{PgType, PgTypeInfo};
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

/// A `timetz` value: a time of day with a fixed UTC offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PgTimeTz {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

impl Display for PgTimeTz {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.time.format("%H:%M:%S%.f"), self.offset)
    }
}

// Binary timestamps count microseconds from the PostgreSQL epoch,
// 2000-01-01; dates count days from it.

fn pg_epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

fn pg_epoch_datetime() -> NaiveDateTime {
    pg_epoch_date().and_hms_opt(0, 0, 0).unwrap()
}

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    match value.format {
        PgValueFormat::Binary => decode_binary(value),
        PgValueFormat::Text => decode_text(&value.type_info.0, value.as_str()?),
    }
}

fn decode_binary(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let mut buf = value.as_bytes()?;

    Ok(match value.type_info.0 {
        PgType::Date => {
            if buf.len() != 4 {
                return Err(Error::Decode("date must be 4 bytes".into()));
            }

            let days = buf.get_i32();

            // the infinities arrive as the sentinel extremes
            PgValue::Date(match days {
                i32::MAX => NaiveDate::MAX,
                i32::MIN => NaiveDate::MIN,
                _ => pg_epoch_date() + Duration::days(i64::from(days)),
            })
        }

        PgType::Time => {
            let us = read_i64(&mut buf, "time")?;

            PgValue::Time(
                NaiveTime::from_num_seconds_from_midnight_opt(
                    (us / 1_000_000) as u32,
                    ((us % 1_000_000) * 1000) as u32,
                )
                .ok_or_else(|| Error::Decode("time out of range".into()))?,
            )
        }

        PgType::Timetz => {
            if buf.len() != 12 {
                return Err(Error::Decode("timetz must be 12 bytes".into()));
            }

            let us = buf.get_i64();

            // the wire carries seconds *west* of UTC
            let seconds_west = buf.get_i32();

            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (us / 1_000_000) as u32,
                ((us % 1_000_000) * 1000) as u32,
            )
            .ok_or_else(|| Error::Decode("timetz out of range".into()))?;

            let offset = FixedOffset::west_opt(seconds_west)
                .ok_or_else(|| Error::Decode("timetz offset out of range".into()))?;

            PgValue::TimeTz(PgTimeTz { time, offset })
        }

        PgType::Timestamp => {
            let us = read_i64(&mut buf, "timestamp")?;
            PgValue::Timestamp(timestamp_from_micros(us)?)
        }

        PgType::Timestamptz => {
            let us = read_i64(&mut buf, "timestamptz")?;
            PgValue::TimestampTz(Utc.from_utc_datetime(&timestamp_from_micros(us)?))
        }

        _ => unreachable!("decode dispatched a non-datetime type"),
    })
}

fn read_i64(buf: &mut &[u8], what: &str) -> Result<i64, Error> {
    if buf.len() != 8 {
        return Err(Error::Decode(format!("{what} must be 8 bytes").into()));
    }

    Ok(buf.get_i64())
}

fn timestamp_from_micros(us: i64) -> Result<NaiveDateTime, Error> {
    match us {
        i64::MAX => Ok(NaiveDateTime::MAX),
        i64::MIN => Ok(NaiveDateTime::MIN),

        _ => pg_epoch_datetime()
            .checked_add_signed(Duration::microseconds(us))
            .ok_or_else(|| Error::Decode("timestamp out of range".into())),
    }
}

fn decode_text(ty: &PgType, s: &str) -> Result<PgValue, Error> {
    Ok(match ty {
        PgType::Date => PgValue::Date(match s {
            "infinity" => NaiveDate::MAX,
            "-infinity" => NaiveDate::MIN,
            _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(Error::decode)?,
        }),

        PgType::Time => PgValue::Time(
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f").map_err(Error::decode)?,
        ),

        PgType::Timetz => {
            // 13:45:00.5+02 or 13:45:00.5+02:30
            let split = s
                .rfind(['+', '-'])
                .ok_or_else(|| Error::Decode("timetz is missing its offset".into()))?;

            let time = NaiveTime::parse_from_str(&s[..split], "%H:%M:%S%.f")
                .map_err(Error::decode)?;

            let offset = parse_offset(&s[split..])?;

            PgValue::TimeTz(PgTimeTz { time, offset })
        }

        PgType::Timestamp => PgValue::Timestamp(match s {
            "infinity" => NaiveDateTime::MAX,
            "-infinity" => NaiveDateTime::MIN,
            _ => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(Error::decode)?,
        }),

        PgType::Timestamptz => PgValue::TimestampTz(match s {
            "infinity" => Utc.from_utc_datetime(&NaiveDateTime::MAX),
            "-infinity" => Utc.from_utc_datetime(&NaiveDateTime::MIN),
            _ => DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z")
                .map_err(Error::decode)?
                .with_timezone(&Utc),
        }),

        _ => unreachable!("decode dispatched a non-datetime type"),
    })
}

fn parse_offset(s: &str) -> Result<FixedOffset, Error> {
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(Error::Decode(format!("malformed UTC offset: {s:?}").into())),
    };

    let mut parts = rest.split(':');

    let hours: i32 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(Error::decode)?;
    let minutes: i32 = parts.next().map_or(Ok(0), str::parse).map_err(Error::decode)?;
    let seconds: i32 = parts.next().map_or(Ok(0), str::parse).map_err(Error::decode)?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
        .ok_or_else(|| Error::Decode(format!("UTC offset out of range: {s:?}").into()))
}

pub(crate) fn encode(
    expected: &PgType,
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    match (expected, value) {
        (PgType::Date, PgValue::Date(v)) => {
            let days = if *v == NaiveDate::MAX {
                i32::MAX
            } else if *v == NaiveDate::MIN {
                i32::MIN
            } else {
                i32::try_from((*v - pg_epoch_date()).num_days())
                    .map_err(|_| Error::Encode("date out of range".into()))?
            };

            buf.extend_from_slice(&days.to_be_bytes());
        }

        (PgType::Time, PgValue::Time(v)) => {
            let us = (*v - NaiveTime::from_hms_opt(0, 0, 0).unwrap())
                .num_microseconds()
                .unwrap_or_default();

            buf.extend_from_slice(&us.to_be_bytes());
        }

        (PgType::Timetz, PgValue::TimeTz(v)) => {
            let us = (v.time - NaiveTime::from_hms_opt(0, 0, 0).unwrap())
                .num_microseconds()
                .unwrap_or_default();

            buf.extend_from_slice(&us.to_be_bytes());
            buf.extend_from_slice(&(-v.offset.local_minus_utc()).to_be_bytes());
        }

        (PgType::Timestamp, PgValue::Timestamp(v)) => {
            buf.extend_from_slice(&timestamp_to_micros(v).to_be_bytes());
        }

        (PgType::Timestamptz, PgValue::TimestampTz(v)) => {
            buf.extend_from_slice(&timestamp_to_micros(&v.naive_utc()).to_be_bytes());
        }

        // a naive timestamp binds to a timestamptz parameter as UTC
        (PgType::Timestamptz, PgValue::Timestamp(v)) => {
            buf.extend_from_slice(&timestamp_to_micros(v).to_be_bytes());
        }

        (expected, value) => return Err(type_mismatch(&PgTypeInfo(expected.clone()), value)),
    }

    Ok(IsNull::No)
}

fn timestamp_to_micros(v: &NaiveDateTime) -> i64 {
    if *v == NaiveDateTime::MAX {
        i64::MAX
    } else if *v == NaiveDateTime::MIN {
        i64::MIN
    } else {
        (*v - pg_epoch_datetime())
            .num_microseconds()
            .unwrap_or(i64::MAX)
    }
}

pub(crate) fn date_to_text(v: NaiveDate) -> String {
    if v == NaiveDate::MAX {
        "infinity".to_owned()
    } else if v == NaiveDate::MIN {
        "-infinity".to_owned()
    } else {
        v.format("%Y-%m-%d").to_string()
    }
}

pub(crate) fn timestamp_to_text(v: NaiveDateTime) -> String {
    if v == NaiveDateTime::MAX {
        "infinity".to_owned()
    } else if v == NaiveDateTime::MIN {
        "-infinity".to_owned()
    } else {
        v.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

pub(crate) fn timestamptz_to_text(v: DateTime<Utc>) -> String {
    v.format("%Y-%m-%d %H:%M:%S%.f+00").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_ref<'a>(bytes: &'a [u8], ty: PgTypeInfo) -> PgValueRef<'a> {
        PgValueRef::new(Some(bytes), PgValueFormat::Binary, ty)
    }

    #[test]
    fn timestamp_binary_round_trip() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(12, 30, 45, 123_456)
            .unwrap();

        let mut buf = Vec::new();
        encode(&PgType::Timestamp, &PgValue::Timestamp(ts), &mut buf).unwrap();

        assert_eq!(
            decode(&value_ref(&buf, PgTypeInfo::TIMESTAMP)).unwrap(),
            PgValue::Timestamp(ts)
        );
    }

    #[test]
    fn epoch_is_zero_days() {
        let mut buf = Vec::new();
        encode(
            &PgType::Date,
            &PgValue::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
            &mut buf,
        )
        .unwrap();

        assert_eq!(buf, [0, 0, 0, 0]);
    }

    #[test]
    fn infinity_maps_to_sentinels() {
        let mut buf = Vec::new();
        encode(
            &PgType::Timestamp,
            &PgValue::Timestamp(NaiveDateTime::MAX),
            &mut buf,
        )
        .unwrap();

        assert_eq!(buf, i64::MAX.to_be_bytes());

        assert_eq!(
            decode(&value_ref(&buf, PgTypeInfo::TIMESTAMP)).unwrap(),
            PgValue::Timestamp(NaiveDateTime::MAX)
        );
    }

    #[test]
    fn decodes_text_timestamptz() {
        let value = PgValueRef::new(
            Some(b"2024-03-01 12:00:00+00"),
            PgValueFormat::Text,
            PgTypeInfo::TIMESTAMPTZ,
        );

        match decode(&value).unwrap() {
            PgValue::TimestampTz(v) => {
                assert_eq!(v.naive_utc().to_string(), "2024-03-01 12:00:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
