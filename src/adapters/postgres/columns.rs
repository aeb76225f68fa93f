//! Decoding of the first result column into text.

use std::error::Error;
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use postgres_types::{FromSql, Kind, Type};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::ports::{DatabaseError, ResultRow};

type DecodeError = Box<dyn Error + Sync + Send>;

/// A column value rendered as text, close to the server's own output
/// format for that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextColumn(pub String);

impl<'a> FromSql<'a> for TextColumn {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        decode(ty, raw).map(TextColumn)
    }

    fn accepts(ty: &Type) -> bool {
        supported(ty)
    }
}

fn supported(ty: &Type) -> bool {
    match ty.kind() {
        Kind::Enum(_) => return true,
        Kind::Domain(inner) => return supported(inner),
        _ => {}
    }
    <&str as FromSql>::accepts(ty)
        || matches!(
            *ty,
            Type::BOOL
                | Type::CHAR
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::OID
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::JSON
                | Type::JSONB
                | Type::UUID
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::TIME
                | Type::VOID
        )
}

fn decode(ty: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    match ty.kind() {
        Kind::Enum(_) => return Ok(std::str::from_utf8(raw)?.to_string()),
        Kind::Domain(inner) => return decode(inner, raw),
        _ => {}
    }
    if <&str as FromSql>::accepts(ty) {
        return Ok(<&str as FromSql>::from_sql(ty, raw)?.to_string());
    }

    let text = match *ty {
        Type::BOOL => bool::from_sql(ty, raw)?.to_string(),
        Type::CHAR => char_text(i8::from_sql(ty, raw)? as u8),
        Type::INT2 => i16::from_sql(ty, raw)?.to_string(),
        Type::INT4 => i32::from_sql(ty, raw)?.to_string(),
        Type::INT8 => i64::from_sql(ty, raw)?.to_string(),
        Type::OID => u32::from_sql(ty, raw)?.to_string(),
        Type::FLOAT4 => {
            let v = f32::from_sql(ty, raw)?;
            float_text(v.to_string(), format!("{:e}", v), FLOAT4_DIGITS)
        }
        Type::FLOAT8 => {
            let v = f64::from_sql(ty, raw)?;
            float_text(v.to_string(), format!("{:e}", v), FLOAT8_DIGITS)
        }
        Type::NUMERIC => decode_numeric(raw)?,
        Type::JSON => std::str::from_utf8(raw)?.to_string(),
        Type::JSONB => match raw.split_first() {
            Some((1, body)) => std::str::from_utf8(body)?.to_string(),
            Some((version, _)) => return Err(format!("unsupported jsonb version {}", version).into()),
            None => return Err("empty jsonb value".into()),
        },
        Type::UUID => Uuid::from_sql(ty, raw)?.to_string(),
        Type::TIMESTAMP => {
            let v = NaiveDateTime::from_sql(ty, raw)?;
            with_fraction(v.format("%Y-%m-%d %H:%M:%S").to_string(), v.nanosecond())
        }
        // Rendered in UTC, whatever the session time zone.
        Type::TIMESTAMPTZ => {
            let v = DateTime::<Utc>::from_sql(ty, raw)?;
            let mut text = with_fraction(v.format("%Y-%m-%d %H:%M:%S").to_string(), v.nanosecond());
            text.push_str("+00");
            text
        }
        Type::DATE => NaiveDate::from_sql(ty, raw)?.to_string(),
        Type::TIME => {
            let v = NaiveTime::from_sql(ty, raw)?;
            with_fraction(v.format("%H:%M:%S").to_string(), v.nanosecond())
        }
        Type::VOID => String::new(),
        _ => return Err(format!("unsupported column type {}", ty.name()).into()),
    };
    Ok(text)
}

const FLOAT4_DIGITS: i32 = 6;
const FLOAT8_DIGITS: i32 = 15;

/// Shortest round-trip digits, in exponent notation when the decimal
/// exponent is below -4 or at least `digits`, as the server prints floats.
fn float_text(fixed: String, scientific: String, digits: i32) -> String {
    let exponent = scientific
        .split_once('e')
        .and_then(|(mantissa, exp)| Some((mantissa, exp.parse::<i32>().ok()?)));
    match exponent {
        Some((_, exp)) if (-4..digits).contains(&exp) => fixed,
        Some((mantissa, exp)) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => match fixed.as_str() {
            "inf" => "Infinity".to_string(),
            "-inf" => "-Infinity".to_string(),
            _ => fixed,
        },
    }
}

/// Appends microseconds without trailing zeros, omitted when zero.
fn with_fraction(mut text: String, nanos: u32) -> String {
    // Leap seconds are stored as nanos past one second.
    let micros = (nanos % 1_000_000_000) / 1_000;
    if micros > 0 {
        let fraction = format!("{:06}", micros);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}

/// The single-byte `"char"` type: high bytes print as octal escapes.
fn char_text(byte: u8) -> String {
    match byte {
        0 => String::new(),
        b if b < 0x80 => (b as char).to_string(),
        b => format!("\\{:03o}", b),
    }
}

/// Renders a binary `numeric` value (base-10000 digit groups).
fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    const NEGATIVE: u16 = 0x4000;
    const NAN: u16 = 0xC000;
    const POS_INF: u16 = 0xD000;
    const NEG_INF: u16 = 0xF000;

    let word = |i: usize| -> Result<u16, DecodeError> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16 as i32;
    let sign = word(2)?;
    let dscale = word(3)? as usize;
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<_>, _>>()?;

    match sign {
        NAN => return Ok("NaN".to_string()),
        POS_INF => return Ok("Infinity".to_string()),
        NEG_INF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let group = |i: i32| -> u16 {
        if i < 0 {
            0
        } else {
            digits.get(i as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if sign == NEGATIVE {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                write!(out, "{}", group(i))?;
            } else {
                write!(out, "{:04}", group(i))?;
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", group(i))?;
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

/// Returns an error if the first column of a result cannot be rendered.
pub(crate) fn check_first_column(ty: Option<&Type>) -> Result<(), DatabaseError> {
    match ty {
        Some(ty) if !supported(ty) => Err(DatabaseError::UnsupportedColumnType(ty.name().to_string())),
        _ => Ok(()),
    }
}

/// Reduces a row to its first column.
pub(crate) fn first_column(row: &Row) -> Result<ResultRow, DatabaseError> {
    if row.is_empty() {
        return Ok(ResultRow::new(None));
    }
    let value: Option<TextColumn> = row.try_get(0)?;
    Ok(ResultRow::new(value.map(|v| v.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode(&Type::BOOL, &[1]).unwrap(), "true");
        assert_eq!(decode(&Type::INT4, &42i32.to_be_bytes()).unwrap(), "42");
        assert_eq!(decode(&Type::INT8, &(-7i64).to_be_bytes()).unwrap(), "-7");
        assert_eq!(decode(&Type::FLOAT8, &1.5f64.to_be_bytes()).unwrap(), "1.5");
        assert_eq!(decode(&Type::TEXT, b"hello").unwrap(), "hello");
        assert_eq!(decode(&Type::VOID, b"").unwrap(), "");
    }

    #[test]
    fn floats_use_server_notation() {
        let f8 = |v: f64| decode(&Type::FLOAT8, &v.to_be_bytes()).unwrap();
        assert_eq!(f8(1e300), "1e+300");
        assert_eq!(f8(1.5e-7), "1.5e-07");
        assert_eq!(f8(123456789012345678.0), "1.2345678901234568e+17");
        assert_eq!(f8(1e14), "100000000000000");
        assert_eq!(f8(0.0001), "0.0001");
        assert_eq!(f8(0.0), "0");
        assert_eq!(f8(f64::INFINITY), "Infinity");
        assert_eq!(f8(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(f8(f64::NAN), "NaN");

        let f4 = |v: f32| decode(&Type::FLOAT4, &v.to_be_bytes()).unwrap();
        assert_eq!(f4(100000.0), "100000");
        assert_eq!(f4(1000000.0), "1e+06");
        assert_eq!(f4(2.5), "2.5");
    }

    #[test]
    fn timestamps_trim_fractions_and_use_short_offsets() {
        // 2000-01-01 00:00:00.5 as microseconds since the server epoch
        let half_second = 500_000i64.to_be_bytes();
        assert_eq!(
            decode(&Type::TIMESTAMPTZ, &half_second).unwrap(),
            "2000-01-01 00:00:00.5+00"
        );
        assert_eq!(
            decode(&Type::TIMESTAMP, &0i64.to_be_bytes()).unwrap(),
            "2000-01-01 00:00:00"
        );
        assert_eq!(
            decode(&Type::TIME, &45_296_000_123i64.to_be_bytes()).unwrap(),
            "12:34:56.000123"
        );
    }

    #[test]
    fn decodes_single_byte_char() {
        assert!(check_first_column(Some(&Type::CHAR)).is_ok());
        assert_eq!(decode(&Type::CHAR, b"r").unwrap(), "r");
        assert_eq!(decode(&Type::CHAR, &[0]).unwrap(), "");
        assert_eq!(decode(&Type::CHAR, &[0xe9]).unwrap(), "\\351");
    }

    #[test]
    fn decodes_json_and_jsonb() {
        assert_eq!(decode(&Type::JSON, br#"{"id": 1}"#).unwrap(), r#"{"id": 1}"#);
        assert_eq!(decode(&Type::JSONB, b"\x01{\"id\": 1}").unwrap(), r#"{"id": 1}"#);
        assert!(decode(&Type::JSONB, b"\x02{}").is_err());
    }

    #[test]
    fn decodes_numeric() {
        assert_eq!(decode_numeric(&numeric(0, 0, 2, &[123, 4500])).unwrap(), "123.45");
        assert_eq!(decode_numeric(&numeric(-1, 0x4000, 1, &[5000])).unwrap(), "-0.5");
        assert_eq!(decode_numeric(&numeric(1, 0, 0, &[1])).unwrap(), "10000");
        assert_eq!(decode_numeric(&numeric(-2, 0, 8, &[1234])).unwrap(), "0.00001234");
        assert_eq!(decode_numeric(&numeric(0, 0, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&numeric(0, 0xC000, 0, &[])).unwrap(), "NaN");
    }

    #[test]
    fn truncated_numeric_is_an_error() {
        assert!(decode_numeric(&[0, 1, 0]).is_err());
    }

    #[test]
    fn rejects_unsupported_first_column() {
        assert!(check_first_column(Some(&Type::BYTEA)).is_err());
        assert!(check_first_column(Some(&Type::VARCHAR)).is_ok());
        assert!(check_first_column(None).is_ok());
    }
}
