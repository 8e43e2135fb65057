use std::fmt::{self, Display, Formatter, Write};

use bytes::Buf;

use crate::error::Error;
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

/// An `interval` in its native three-component form.
///
/// The components do not reduce into each other: a month is not a fixed
/// number of days, and a day is not a fixed number of hours across DST
/// boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PgInterval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let v = match value.format {
        PgValueFormat::Binary => {
            let mut buf = value.as_bytes()?;

            if buf.len() != 16 {
                return Err(Error::Decode("interval must be 16 bytes".into()));
            }

            let microseconds = buf.get_i64();
            let days = buf.get_i32();
            let months = buf.get_i32();

            PgInterval {
                months,
                days,
                microseconds,
            }
        }

        PgValueFormat::Text => parse_text(value.as_str()?)?,
    };

    Ok(PgValue::Interval(v))
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match value {
        PgValue::Interval(v) => {
            buf.extend_from_slice(&v.microseconds.to_be_bytes());
            buf.extend_from_slice(&v.days.to_be_bytes());
            buf.extend_from_slice(&v.months.to_be_bytes());
        }

        other => return Err(type_mismatch(&crate::type_info::PgTypeInfo::INTERVAL, other)),
    }

    Ok(IsNull::No)
}

/// Parse the server's default (`IntervalStyle = postgres`) output, e.g.
/// `1 year 2 mons 3 days 04:05:06.789` or `-00:00:01`.
fn parse_text(s: &str) -> Result<PgInterval, Error> {
    let mut interval = PgInterval::default();
    let mut tokens = s.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        if token.contains(':') {
            interval.microseconds += parse_clock(token)?;
            continue;
        }

        let quantity: i64 = token
            .parse()
            .map_err(|_| Error::Decode(format!("malformed interval: {s:?}").into()))?;

        let unit = tokens
            .next()
            .ok_or_else(|| Error::Decode(format!("interval is missing a unit: {s:?}").into()))?;

        match unit.trim_end_matches('s') {
            "year" => interval.months += (quantity * 12) as i32,
            "mon" => interval.months += quantity as i32,
            "day" => interval.days += quantity as i32,

            other => {
                return Err(Error::Decode(
                    format!("unknown interval unit {other:?}").into(),
                ));
            }
        }
    }

    Ok(interval)
}

fn parse_clock(token: &str) -> Result<i64, Error> {
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let mut parts = token.split(':');

    let hours: i64 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(Error::decode)?;
    let minutes: i64 = parts.next().map_or(Ok(0), str::parse).map_err(Error::decode)?;

    let (seconds, micros) = match parts.next() {
        Some(sec) => {
            let (whole, frac) = sec.split_once('.').unwrap_or((sec, ""));
            let mut padded = frac.to_owned();
            while padded.len() < 6 {
                padded.push('0');
            }
            padded.truncate(6);

            (
                whole.parse::<i64>().map_err(Error::decode)?,
                if padded.is_empty() {
                    0
                } else {
                    padded.parse::<i64>().map_err(Error::decode)?
                },
            )
        }
        None => (0, 0),
    };

    let total = ((hours * 60 + minutes) * 60 + seconds) * 1_000_000 + micros;

    Ok(if negative { -total } else { total })
}

impl Display for PgInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut wrote = false;

        let years = self.months / 12;
        let months = self.months % 12;

        if years != 0 {
            write!(f, "{years} year{}", plural(years))?;
            wrote = true;
        }

        if months != 0 {
            if wrote {
                f.write_char(' ')?;
            }
            write!(f, "{months} mon{}", plural(months))?;
            wrote = true;
        }

        if self.days != 0 {
            if wrote {
                f.write_char(' ')?;
            }
            write!(f, "{} day{}", self.days, plural(self.days))?;
            wrote = true;
        }

        if self.microseconds != 0 || !wrote {
            if wrote {
                f.write_char(' ')?;
            }

            let us = self.microseconds;
            let sign = if us < 0 { "-" } else { "" };
            let us = us.unsigned_abs();

            let hours = us / 3_600_000_000;
            let minutes = (us / 60_000_000) % 60;
            let seconds = (us / 1_000_000) % 60;
            let micros = us % 1_000_000;

            write!(f, "{sign}{hours:02}:{minutes:02}:{seconds:02}")?;

            if micros != 0 {
                let frac = format!("{micros:06}");
                write!(f, ".{}", frac.trim_end_matches('0'))?;
            }
        }

        Ok(())
    }
}

fn plural(n: impl Into<i64>) -> &'static str {
    if n.into().abs() == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::PgTypeInfo;

    #[test]
    fn binary_round_trip() {
        let interval = PgInterval {
            months: 14,
            days: 3,
            microseconds: 4 * 3_600_000_000 + 5 * 60_000_000 + 6_789_000,
        };

        let mut buf = Vec::new();
        encode(&PgValue::Interval(interval), &mut buf).unwrap();
        assert_eq!(buf.len(), 16);

        let value = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo::INTERVAL);
        assert_eq!(decode(&value).unwrap(), PgValue::Interval(interval));
    }

    #[test]
    fn parses_postgres_style_text() {
        let parsed = parse_text("1 year 2 mons 3 days 04:05:06.789").unwrap();

        assert_eq!(parsed.months, 14);
        assert_eq!(parsed.days, 3);
        assert_eq!(
            parsed.microseconds,
            4 * 3_600_000_000_i64 + 5 * 60_000_000 + 6_789_000
        );
    }

    #[test]
    fn displays_like_the_server() {
        let interval = PgInterval {
            months: 14,
            days: 3,
            microseconds: 4 * 3_600_000_000 + 5 * 60_000_000 + 6_789_000,
        };

        assert_eq!(interval.to_string(), "1 year 2 mons 3 days 04:05:06.789");

        assert_eq!(PgInterval::default().to_string(), "00:00:00");
    }

    #[test]
    fn text_round_trip() {
        for text in ["00:00:00", "-00:00:01", "2 years 12 days 01:00:00"] {
            assert_eq!(parse_text(text).unwrap().to_string(), text);
        }
    }
}
