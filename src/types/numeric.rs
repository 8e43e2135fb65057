use std::fmt::{self, Display, Formatter, Write};
use std::str::FromStr;

use bytes::Buf;

use crate::error::Error;
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_PINF: u16 = 0xD000;
const SIGN_NINF: u16 = 0xF000;

/// An arbitrary-precision `numeric` value in its wire representation:
/// base-10000 digits with a decimal weight and display scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgNumeric {
    /// Not a number, e.g. the result of `0/0`.
    NotANumber,

    /// `infinity` (servers 14 and later).
    Infinity,

    /// `-infinity` (servers 14 and later).
    NegativeInfinity,

    Number {
        /// `false` for negative numbers.
        positive: bool,

        /// Base-10000 digits, most significant first. The digit at index
        /// `k` is scaled by `10000^(weight - k)`.
        digits: Vec<i16>,

        /// Exponent (in base 10000) of the first digit.
        weight: i16,

        /// Number of decimal digits displayed after the point.
        scale: u16,
    },
}

impl PgNumeric {
    pub(crate) fn from_binary(mut buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 8 {
            return Err(Error::Decode("numeric is too short".into()));
        }

        let ndigits = buf.get_i16();
        let weight = buf.get_i16();
        let sign = buf.get_u16();
        let scale = buf.get_i16();

        match sign {
            SIGN_NAN => return Ok(PgNumeric::NotANumber),
            SIGN_PINF => return Ok(PgNumeric::Infinity),
            SIGN_NINF => return Ok(PgNumeric::NegativeInfinity),
            SIGN_POSITIVE | SIGN_NEGATIVE => {}
            other => return Err(Error::Decode(format!("invalid numeric sign {other:#x}").into())),
        }

        let ndigits = usize::try_from(ndigits)
            .map_err(|_| Error::Decode("negative numeric digit count".into()))?;

        if buf.len() < ndigits * 2 {
            return Err(Error::Decode("numeric digits truncated".into()));
        }

        let mut digits = Vec::with_capacity(ndigits);
        for _ in 0..ndigits {
            digits.push(buf.get_i16());
        }

        Ok(PgNumeric::Number {
            positive: sign == SIGN_POSITIVE,
            digits,
            weight,
            scale: scale as u16,
        })
    }

    pub(crate) fn to_binary(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            PgNumeric::NotANumber => put_header(buf, 0, 0, SIGN_NAN, 0),
            PgNumeric::Infinity => put_header(buf, 0, 0, SIGN_PINF, 0),
            PgNumeric::NegativeInfinity => put_header(buf, 0, 0, SIGN_NINF, 0),

            PgNumeric::Number {
                positive,
                digits,
                weight,
                scale,
            } => {
                let ndigits = i16::try_from(digits.len())
                    .map_err(|_| Error::Encode("numeric has too many digits".into()))?;

                let sign = if *positive { SIGN_POSITIVE } else { SIGN_NEGATIVE };

                put_header(buf, ndigits, *weight, sign, *scale as i16);

                for digit in digits {
                    buf.extend_from_slice(&digit.to_be_bytes());
                }
            }
        }

        Ok(())
    }
}

fn put_header(buf: &mut Vec<u8>, ndigits: i16, weight: i16, sign: u16, scale: i16) {
    buf.extend_from_slice(&ndigits.to_be_bytes());
    buf.extend_from_slice(&weight.to_be_bytes());
    buf.extend_from_slice(&sign.to_be_bytes());
    buf.extend_from_slice(&scale.to_be_bytes());
}

impl Display for PgNumeric {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PgNumeric::NotANumber => f.write_str("NaN"),
            PgNumeric::Infinity => f.write_str("Infinity"),
            PgNumeric::NegativeInfinity => f.write_str("-Infinity"),

            PgNumeric::Number {
                positive,
                digits,
                weight,
                scale,
            } => {
                if !positive {
                    f.write_char('-')?;
                }

                if *weight < 0 {
                    f.write_char('0')?;
                } else {
                    for k in 0..=*weight as usize {
                        let digit = digits.get(k).copied().unwrap_or(0);

                        if k == 0 {
                            write!(f, "{digit}")?;
                        } else {
                            write!(f, "{digit:04}")?;
                        }
                    }
                }

                if *scale > 0 {
                    let mut frac = String::with_capacity(*scale as usize + 4);

                    // zero groups between the point and the first stored digit
                    for _ in 0..(-(i32::from(*weight) + 1)).max(0) {
                        frac.push_str("0000");
                    }

                    let start = if *weight >= 0 { *weight as usize + 1 } else { 0 };

                    for digit in digits.iter().skip(start) {
                        write!(frac, "{digit:04}")?;
                    }

                    while frac.len() < *scale as usize {
                        frac.push('0');
                    }

                    frac.truncate(*scale as usize);

                    f.write_char('.')?;
                    f.write_str(&frac)?;
                }

                Ok(())
            }
        }
    }
}

impl FromStr for PgNumeric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "NaN" => return Ok(PgNumeric::NotANumber),
            "Infinity" => return Ok(PgNumeric::Infinity),
            "-Infinity" => return Ok(PgNumeric::NegativeInfinity),
            _ => {}
        }

        let (positive, s) = match s.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::Decode("empty numeric literal".into()));
        }

        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Decode(format!("malformed numeric literal: {s:?}").into()));
        }

        let scale = frac_part.len() as u16;

        // align the decimal point on a base-10000 group boundary
        let mut decimal: String = String::with_capacity(s.len() + 6);

        for _ in 0..(4 - int_part.len() % 4) % 4 {
            decimal.push('0');
        }
        decimal.push_str(int_part);

        decimal.push_str(frac_part);
        for _ in 0..(4 - frac_part.len() % 4) % 4 {
            decimal.push('0');
        }

        let mut digits: Vec<i16> = decimal
            .as_bytes()
            .chunks(4)
            .map(|group| {
                group
                    .iter()
                    .fold(0i16, |acc, b| acc * 10 + i16::from(*b - b'0'))
            })
            .collect();

        let mut weight = if int_part.is_empty() {
            -1
        } else {
            (int_part.len().div_ceil(4) as i16) - 1
        };

        // strip leading zero groups
        while digits.first() == Some(&0) && digits.len() > 1 {
            digits.remove(0);
            weight -= 1;
        }

        // strip trailing zero groups
        while digits.last() == Some(&0) && digits.len() > 1 {
            digits.pop();
        }

        if digits == [0] {
            digits.clear();
            weight = 0;
        }

        Ok(PgNumeric::Number {
            positive,
            digits,
            weight,
            scale,
        })
    }
}

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let v = match value.format {
        PgValueFormat::Binary => PgNumeric::from_binary(value.as_bytes()?)?,
        PgValueFormat::Text => value.as_str()?.parse()?,
    };

    Ok(PgValue::Numeric(v))
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    let numeric;

    let v = match value {
        PgValue::Numeric(v) => v,

        // integers convert exactly
        v if v.as_i64().is_some() => {
            numeric = PgNumeric::from_str(&v.as_i64().unwrap().to_string())?;
            &numeric
        }

        PgValue::Text(s) => {
            numeric = PgNumeric::from_str(s)?;
            &numeric
        }

        other => return Err(type_mismatch(&crate::type_info::PgTypeInfo::NUMERIC, other)),
    };

    v.to_binary(buf)?;

    Ok(IsNull::No)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn round_trip(text: &str) {
        let parsed: PgNumeric = text.parse().unwrap();

        assert_eq!(parsed.to_string(), text, "display");

        let mut buf = Vec::new();
        parsed.to_binary(&mut buf).unwrap();
        assert_eq!(PgNumeric::from_binary(&buf).unwrap(), parsed, "binary");
    }

    #[test]
    fn representative_values_round_trip() {
        round_trip("0");
        round_trip("1234.5678");
        round_trip("-1234.5678");
        round_trip("0.0001");
        round_trip("12000000");
        round_trip("9999.00");
        round_trip("NaN");
    }

    #[test]
    fn parses_with_expected_wire_layout() {
        match "1234.5678".parse().unwrap() {
            PgNumeric::Number {
                positive,
                digits,
                weight,
                scale,
            } => {
                assert!(positive);
                assert_eq!(digits, [1234, 5678]);
                assert_eq!(weight, 0);
                assert_eq!(scale, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_renders_scale() {
        let zero = PgNumeric::Number {
            positive: true,
            digits: vec![],
            weight: 0,
            scale: 2,
        };

        assert_eq!(zero.to_string(), "0.00");
    }
}
