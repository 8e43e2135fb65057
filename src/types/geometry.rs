use std::fmt::{self, Display, Formatter};

use bytes::Buf;

use crate::error::Error;
use crate::type_info::{PgType, PgTypeInfo};
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PgPoint {
    pub x: f64,
    pub y: f64,
}

/// A line in `Ax + By + C = 0` form.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PgLine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PgLseg {
    pub start: PgPoint,
    pub end: PgPoint,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PgBox {
    pub upper_right: PgPoint,
    pub lower_left: PgPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PgPath {
    pub closed: bool,
    pub points: Vec<PgPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PgPolygon {
    pub points: Vec<PgPoint>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PgCircle {
    pub center: PgPoint,
    pub radius: f64,
}

impl Display for PgPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl Display for PgLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{},{}}}", self.a, self.b, self.c)
    }
}

impl Display for PgLseg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

impl Display for PgBox {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.upper_right, self.lower_left)
    }
}

impl Display for PgPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (open, close) = if self.closed { ("(", ")") } else { ("[", "]") };

        f.write_str(open)?;
        for (i, point) in self.points.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            point.fmt(f)?;
        }
        f.write_str(close)
    }
}

impl Display for PgPolygon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, point) in self.points.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            point.fmt(f)?;
        }
        f.write_str(")")
    }
}

impl Display for PgCircle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{}>", self.center, self.radius)
    }
}

fn get_point(buf: &mut &[u8]) -> Result<PgPoint, Error> {
    if buf.len() < 16 {
        return Err(Error::Decode("geometric value truncated".into()));
    }

    Ok(PgPoint {
        x: buf.get_f64(),
        y: buf.get_f64(),
    })
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
        PgType::Point => PgValue::Point(get_point(&mut buf)?),

        PgType::Line => {
            if buf.len() != 24 {
                return Err(Error::Decode("line must be 24 bytes".into()));
            }

            PgValue::Line(PgLine {
                a: buf.get_f64(),
                b: buf.get_f64(),
                c: buf.get_f64(),
            })
        }

        PgType::Lseg => PgValue::Lseg(PgLseg {
            start: get_point(&mut buf)?,
            end: get_point(&mut buf)?,
        }),

        PgType::Box => PgValue::Box(PgBox {
            upper_right: get_point(&mut buf)?,
            lower_left: get_point(&mut buf)?,
        }),

        PgType::Path => {
            if buf.len() < 5 {
                return Err(Error::Decode("path is too short".into()));
            }

            let closed = buf.get_u8() != 0;
            let count = buf.get_i32();

            let mut points = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                points.push(get_point(&mut buf)?);
            }

            PgValue::Path(PgPath { closed, points })
        }

        PgType::Polygon => {
            if buf.len() < 4 {
                return Err(Error::Decode("polygon is too short".into()));
            }

            let count = buf.get_i32();

            let mut points = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                points.push(get_point(&mut buf)?);
            }

            PgValue::Polygon(PgPolygon { points })
        }

        PgType::Circle => {
            let center = get_point(&mut buf)?;

            if buf.len() != 8 {
                return Err(Error::Decode("circle radius truncated".into()));
            }

            PgValue::Circle(PgCircle {
                center,
                radius: buf.get_f64(),
            })
        }

        _ => unreachable!("decode dispatched a non-geometric type"),
    })
}

fn decode_text(ty: &PgType, s: &str) -> Result<PgValue, Error> {
    let malformed = || Error::Decode(format!("malformed geometric literal: {s:?}").into());

    Ok(match ty {
        PgType::Point => PgValue::Point(parse_point(s).ok_or_else(malformed)?),

        PgType::Line => {
            let inner = s
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(malformed)?;

            let nums = parse_floats(inner).ok_or_else(malformed)?;

            match nums[..] {
                [a, b, c] => PgValue::Line(PgLine { a, b, c }),
                _ => return Err(malformed()),
            }
        }

        PgType::Lseg => {
            let inner = s
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(malformed)?;

            let points = parse_points(inner).ok_or_else(malformed)?;

            match points[..] {
                [start, end] => PgValue::Lseg(PgLseg { start, end }),
                _ => return Err(malformed()),
            }
        }

        PgType::Box => {
            let points = parse_points(s).ok_or_else(malformed)?;

            match points[..] {
                [upper_right, lower_left] => PgValue::Box(PgBox {
                    upper_right,
                    lower_left,
                }),
                _ => return Err(malformed()),
            }
        }

        PgType::Path => {
            let (closed, inner) = if let Some(inner) =
                s.strip_prefix('(').and_then(|s| s.strip_suffix(')'))
            {
                (true, inner)
            } else if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                (false, inner)
            } else {
                return Err(malformed());
            };

            PgValue::Path(PgPath {
                closed,
                points: parse_points(inner).ok_or_else(malformed)?,
            })
        }

        PgType::Polygon => {
            let inner = s
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(malformed)?;

            PgValue::Polygon(PgPolygon {
                points: parse_points(inner).ok_or_else(malformed)?,
            })
        }

        PgType::Circle => {
            let inner = s
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
                .ok_or_else(malformed)?;

            let (center, radius) = inner.rsplit_once(',').ok_or_else(malformed)?;

            PgValue::Circle(PgCircle {
                center: parse_point(center.trim()).ok_or_else(malformed)?,
                radius: radius.trim().parse().map_err(|_| malformed())?,
            })
        }

        _ => unreachable!("decode dispatched a non-geometric type"),
    })
}

fn parse_point(s: &str) -> Option<PgPoint> {
    let inner = s.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = inner.split_once(',')?;

    Some(PgPoint {
        x: x.trim().parse().ok()?,
        y: y.trim().parse().ok()?,
    })
}

/// Parse a comma-separated list of `(x,y)` pairs.
fn parse_points(s: &str) -> Option<Vec<PgPoint>> {
    s.split("),")
        .map(|part| {
            let part = part.trim();
            let part = if part.ends_with(')') {
                part.to_owned()
            } else {
                format!("{part})")
            };

            parse_point(&part)
        })
        .collect()
}

fn parse_floats(s: &str) -> Option<Vec<f64>> {
    s.split(',').map(|part| part.trim().parse().ok()).collect()
}

pub(crate) fn encode(expected: &PgType, value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    fn put_point(buf: &mut Vec<u8>, p: &PgPoint) {
        buf.extend_from_slice(&p.x.to_be_bytes());
        buf.extend_from_slice(&p.y.to_be_bytes());
    }

    match (expected, value) {
        (PgType::Point, PgValue::Point(v)) => put_point(buf, v),

        (PgType::Line, PgValue::Line(v)) => {
            buf.extend_from_slice(&v.a.to_be_bytes());
            buf.extend_from_slice(&v.b.to_be_bytes());
            buf.extend_from_slice(&v.c.to_be_bytes());
        }

        (PgType::Lseg, PgValue::Lseg(v)) => {
            put_point(buf, &v.start);
            put_point(buf, &v.end);
        }

        (PgType::Box, PgValue::Box(v)) => {
            put_point(buf, &v.upper_right);
            put_point(buf, &v.lower_left);
        }

        (PgType::Path, PgValue::Path(v)) => {
            buf.push(v.closed as u8);
            buf.extend_from_slice(&(v.points.len() as i32).to_be_bytes());
            for point in &v.points {
                put_point(buf, point);
            }
        }

        (PgType::Polygon, PgValue::Polygon(v)) => {
            buf.extend_from_slice(&(v.points.len() as i32).to_be_bytes());
            for point in &v.points {
                put_point(buf, point);
            }
        }

        (PgType::Circle, PgValue::Circle(v)) => {
            put_point(buf, &v.center);
            buf.extend_from_slice(&v.radius.to_be_bytes());
        }

        (expected, value) => return Err(type_mismatch(&PgTypeInfo(expected.clone()), value)),
    }

    Ok(IsNull::No)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_value(ty: PgType, s: &'static str) -> PgValueRef<'static> {
        PgValueRef::new(Some(s.as_bytes()), PgValueFormat::Text, PgTypeInfo(ty))
    }

    #[test]
    fn point_round_trip() {
        let point = PgValue::Point(PgPoint { x: 1.5, y: -2.0 });

        let mut buf = Vec::new();
        encode(&PgType::Point, &point, &mut buf).unwrap();

        let value = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo(PgType::Point));
        assert_eq!(decode(&value).unwrap(), point);
    }

    #[test]
    fn parses_text_literals() {
        assert_eq!(
            decode(&text_value(PgType::Point, "(1.5,-2)")).unwrap(),
            PgValue::Point(PgPoint { x: 1.5, y: -2.0 })
        );

        assert_eq!(
            decode(&text_value(PgType::Path, "[(0,0),(1,1),(2,0)]")).unwrap(),
            PgValue::Path(PgPath {
                closed: false,
                points: vec![
                    PgPoint { x: 0.0, y: 0.0 },
                    PgPoint { x: 1.0, y: 1.0 },
                    PgPoint { x: 2.0, y: 0.0 },
                ],
            })
        );

        assert_eq!(
            decode(&text_value(PgType::Circle, "<(0,0),5>")).unwrap(),
            PgValue::Circle(PgCircle {
                center: PgPoint { x: 0.0, y: 0.0 },
                radius: 5.0
            })
        );
    }

    #[test]
    fn displays_like_the_server() {
        assert_eq!(PgPoint { x: 1.5, y: -2.0 }.to_string(), "(1.5,-2)");
        assert_eq!(
            PgCircle {
                center: PgPoint { x: 0.0, y: 0.0 },
                radius: 5.0
            }
            .to_string(),
            "<(0,0),5>"
        );
    }
}
