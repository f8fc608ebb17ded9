//! XSD built-in datatypes
//!
//! Each built-in knows its whitespace rule, its record schema kind and how to turn a
//! lexical value into a record [`Value`].

use std::borrow::Cow;
use std::sync::OnceLock;

use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::record::{Decimal, SchemaKind, Value};

/// Namespace of the XML Schema language
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace of the XML Schema instance attributes (`xsi:nil`, `xsi:type`, ...)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Scale used for `xs:decimal` values when the schema declares no `fractionDigits`
pub const DEFAULT_DECIMAL_SCALE: u32 = 10;

static DURATION_REGEX: OnceLock<Regex> = OnceLock::new();

fn duration_regex() -> &'static Regex {
    DURATION_REGEX.get_or_init(|| {
        Regex::new(r"^-?P(?:\d+Y)?(?:\d+M)?(?:\d+D)?(?:T(?:\d+H)?(?:\d+M)?(?:\d+(?:\.\d+)?S)?)?$")
            .expect("Failed to compile duration regex")
    })
}

/// Whitespace facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub fn from_lexical(value: &str) -> Option<Self> {
        match value {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            WhiteSpace::Preserve => Cow::Borrowed(value),
            WhiteSpace::Replace => {
                if value.contains(['\t', '\n', '\r']) {
                    Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
                } else {
                    Cow::Borrowed(value)
                }
            }
            WhiteSpace::Collapse => {
                let collapsed = value.split_ascii_whitespace().collect::<Vec<_>>().join(" ");
                if collapsed == value {
                    Cow::Borrowed(value)
                } else {
                    Cow::Owned(collapsed)
                }
            }
        }
    }
}

/// The XSD built-in simple types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinType {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    Id,
    IdRef,
    Entity,
    NmToken,
    AnyUri,
    QName,
    Notation,
    Duration,
    GYear,
    GYearMonth,
    GMonth,
    GMonthDay,
    GDay,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    Base64Binary,
    HexBinary,
    IdRefs,
    NmTokens,
    Entities,
}

const ALL_BUILTINS: &[BuiltinType] = &[
    BuiltinType::AnySimpleType,
    BuiltinType::String,
    BuiltinType::NormalizedString,
    BuiltinType::Token,
    BuiltinType::Language,
    BuiltinType::Name,
    BuiltinType::NcName,
    BuiltinType::Id,
    BuiltinType::IdRef,
    BuiltinType::Entity,
    BuiltinType::NmToken,
    BuiltinType::AnyUri,
    BuiltinType::QName,
    BuiltinType::Notation,
    BuiltinType::Duration,
    BuiltinType::GYear,
    BuiltinType::GYearMonth,
    BuiltinType::GMonth,
    BuiltinType::GMonthDay,
    BuiltinType::GDay,
    BuiltinType::Boolean,
    BuiltinType::Byte,
    BuiltinType::Short,
    BuiltinType::Int,
    BuiltinType::Long,
    BuiltinType::Integer,
    BuiltinType::NonNegativeInteger,
    BuiltinType::PositiveInteger,
    BuiltinType::NonPositiveInteger,
    BuiltinType::NegativeInteger,
    BuiltinType::UnsignedByte,
    BuiltinType::UnsignedShort,
    BuiltinType::UnsignedInt,
    BuiltinType::UnsignedLong,
    BuiltinType::Float,
    BuiltinType::Double,
    BuiltinType::Decimal,
    BuiltinType::Date,
    BuiltinType::Time,
    BuiltinType::DateTime,
    BuiltinType::Base64Binary,
    BuiltinType::HexBinary,
    BuiltinType::IdRefs,
    BuiltinType::NmTokens,
    BuiltinType::Entities,
];

impl BuiltinType {
    pub fn all() -> &'static [BuiltinType] {
        ALL_BUILTINS
    }

    pub fn from_local_name(name: &str) -> Option<Self> {
        ALL_BUILTINS
            .iter()
            .copied()
            .find(|builtin| builtin.local_name() == name)
    }

    pub fn local_name(&self) -> &'static str {
        match self {
            BuiltinType::AnySimpleType => "anySimpleType",
            BuiltinType::String => "string",
            BuiltinType::NormalizedString => "normalizedString",
            BuiltinType::Token => "token",
            BuiltinType::Language => "language",
            BuiltinType::Name => "Name",
            BuiltinType::NcName => "NCName",
            BuiltinType::Id => "ID",
            BuiltinType::IdRef => "IDREF",
            BuiltinType::Entity => "ENTITY",
            BuiltinType::NmToken => "NMTOKEN",
            BuiltinType::AnyUri => "anyURI",
            BuiltinType::QName => "QName",
            BuiltinType::Notation => "NOTATION",
            BuiltinType::Duration => "duration",
            BuiltinType::GYear => "gYear",
            BuiltinType::GYearMonth => "gYearMonth",
            BuiltinType::GMonth => "gMonth",
            BuiltinType::GMonthDay => "gMonthDay",
            BuiltinType::GDay => "gDay",
            BuiltinType::Boolean => "boolean",
            BuiltinType::Byte => "byte",
            BuiltinType::Short => "short",
            BuiltinType::Int => "int",
            BuiltinType::Long => "long",
            BuiltinType::Integer => "integer",
            BuiltinType::NonNegativeInteger => "nonNegativeInteger",
            BuiltinType::PositiveInteger => "positiveInteger",
            BuiltinType::NonPositiveInteger => "nonPositiveInteger",
            BuiltinType::NegativeInteger => "negativeInteger",
            BuiltinType::UnsignedByte => "unsignedByte",
            BuiltinType::UnsignedShort => "unsignedShort",
            BuiltinType::UnsignedInt => "unsignedInt",
            BuiltinType::UnsignedLong => "unsignedLong",
            BuiltinType::Float => "float",
            BuiltinType::Double => "double",
            BuiltinType::Decimal => "decimal",
            BuiltinType::Date => "date",
            BuiltinType::Time => "time",
            BuiltinType::DateTime => "dateTime",
            BuiltinType::Base64Binary => "base64Binary",
            BuiltinType::HexBinary => "hexBinary",
            BuiltinType::IdRefs => "IDREFS",
            BuiltinType::NmTokens => "NMTOKENS",
            BuiltinType::Entities => "ENTITIES",
        }
    }

    /// Prefixed name for diagnostics, e.g. `xs:int`
    pub fn display_name(&self) -> String {
        format!("xs:{}", self.local_name())
    }

    pub fn whitespace(&self) -> WhiteSpace {
        match self {
            BuiltinType::String | BuiltinType::AnySimpleType => WhiteSpace::Preserve,
            BuiltinType::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Item type of the built-in list types
    pub fn list_item(&self) -> Option<BuiltinType> {
        match self {
            BuiltinType::IdRefs => Some(BuiltinType::IdRef),
            BuiltinType::NmTokens => Some(BuiltinType::NmToken),
            BuiltinType::Entities => Some(BuiltinType::Entity),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BuiltinType::Byte
                | BuiltinType::Short
                | BuiltinType::Int
                | BuiltinType::Long
                | BuiltinType::Integer
                | BuiltinType::NonNegativeInteger
                | BuiltinType::PositiveInteger
                | BuiltinType::NonPositiveInteger
                | BuiltinType::NegativeInteger
                | BuiltinType::UnsignedByte
                | BuiltinType::UnsignedShort
                | BuiltinType::UnsignedInt
                | BuiltinType::UnsignedLong
                | BuiltinType::Float
                | BuiltinType::Double
                | BuiltinType::Decimal
        )
    }

    /// Record schema kind of a single (non-list) value of this type
    pub fn record_kind(&self, fraction_digits: Option<u32>) -> SchemaKind {
        match self {
            BuiltinType::Boolean => SchemaKind::Boolean,
            BuiltinType::Byte => SchemaKind::Int8,
            BuiltinType::Short | BuiltinType::UnsignedByte => SchemaKind::Int16,
            BuiltinType::Int | BuiltinType::UnsignedShort => SchemaKind::Int32,
            BuiltinType::Long
            | BuiltinType::Integer
            | BuiltinType::NonNegativeInteger
            | BuiltinType::PositiveInteger
            | BuiltinType::NonPositiveInteger
            | BuiltinType::NegativeInteger
            | BuiltinType::UnsignedInt
            | BuiltinType::UnsignedLong => SchemaKind::Int64,
            BuiltinType::Float => SchemaKind::Float32,
            BuiltinType::Double => SchemaKind::Float64,
            BuiltinType::Decimal => SchemaKind::Decimal {
                scale: fraction_digits.unwrap_or(DEFAULT_DECIMAL_SCALE),
            },
            BuiltinType::Date => SchemaKind::Date,
            BuiltinType::Time => SchemaKind::Time,
            BuiltinType::DateTime => SchemaKind::Timestamp,
            BuiltinType::Base64Binary | BuiltinType::HexBinary => SchemaKind::Bytes,
            _ => SchemaKind::String,
        }
    }

    /// Parse an already whitespace-normalized lexical value
    pub fn parse(&self, lexical: &str, fraction_digits: Option<u32>) -> Result<Value, String> {
        match self {
            BuiltinType::AnySimpleType
            | BuiltinType::String
            | BuiltinType::NormalizedString
            | BuiltinType::Token
            | BuiltinType::AnyUri
            | BuiltinType::Notation
            | BuiltinType::GYear
            | BuiltinType::GYearMonth
            | BuiltinType::GMonth
            | BuiltinType::GMonthDay
            | BuiltinType::GDay => Ok(Value::String(lexical.to_string())),
            BuiltinType::Language
            | BuiltinType::Name
            | BuiltinType::NmToken
            | BuiltinType::Id
            | BuiltinType::IdRef
            | BuiltinType::Entity
            | BuiltinType::NcName
            | BuiltinType::QName => {
                if lexical.is_empty() || lexical.contains(char::is_whitespace) {
                    return Err("expected a single non-empty token".to_string());
                }
                if matches!(
                    self,
                    BuiltinType::NcName
                        | BuiltinType::Id
                        | BuiltinType::IdRef
                        | BuiltinType::Entity
                ) && lexical.contains(':')
                {
                    return Err("colons are not allowed".to_string());
                }
                Ok(Value::String(lexical.to_string()))
            }
            BuiltinType::Duration => {
                if lexical.ends_with('P') || lexical.ends_with('T') || !duration_regex().is_match(lexical) {
                    return Err("not a valid duration".to_string());
                }
                Ok(Value::String(lexical.to_string()))
            }
            BuiltinType::Boolean => match lexical {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err("expected true, false, 1 or 0".to_string()),
            },
            BuiltinType::Byte => parse_integer(lexical, i8::MIN as i128, i8::MAX as i128)
                .map(|v| Value::Int8(v as i8)),
            BuiltinType::Short => parse_integer(lexical, i16::MIN as i128, i16::MAX as i128)
                .map(|v| Value::Int16(v as i16)),
            BuiltinType::UnsignedByte => {
                parse_integer(lexical, 0, u8::MAX as i128).map(|v| Value::Int16(v as i16))
            }
            BuiltinType::Int => parse_integer(lexical, i32::MIN as i128, i32::MAX as i128)
                .map(|v| Value::Int32(v as i32)),
            BuiltinType::UnsignedShort => {
                parse_integer(lexical, 0, u16::MAX as i128).map(|v| Value::Int32(v as i32))
            }
            BuiltinType::Long | BuiltinType::Integer => {
                parse_integer(lexical, i64::MIN as i128, i64::MAX as i128)
                    .map(|v| Value::Int64(v as i64))
            }
            BuiltinType::UnsignedInt => {
                parse_integer(lexical, 0, u32::MAX as i128).map(|v| Value::Int64(v as i64))
            }
            BuiltinType::UnsignedLong | BuiltinType::NonNegativeInteger => {
                parse_integer(lexical, 0, i64::MAX as i128).map(|v| Value::Int64(v as i64))
            }
            BuiltinType::PositiveInteger => {
                parse_integer(lexical, 1, i64::MAX as i128).map(|v| Value::Int64(v as i64))
            }
            BuiltinType::NonPositiveInteger => {
                parse_integer(lexical, i64::MIN as i128, 0).map(|v| Value::Int64(v as i64))
            }
            BuiltinType::NegativeInteger => {
                parse_integer(lexical, i64::MIN as i128, -1).map(|v| Value::Int64(v as i64))
            }
            BuiltinType::Float => parse_float(lexical).map(|v| Value::Float32(v as f32)),
            BuiltinType::Double => parse_float(lexical).map(Value::Float64),
            BuiltinType::Decimal => match fraction_digits {
                Some(scale) => Decimal::parse_with_scale(lexical, scale).map(Value::Decimal),
                None => {
                    let (decimal, rounded) =
                        Decimal::parse_rounded(lexical, DEFAULT_DECIMAL_SCALE)?;
                    if rounded {
                        warn!(
                            value = lexical,
                            scale = DEFAULT_DECIMAL_SCALE,
                            "decimal rounded to record scale"
                        );
                    }
                    Ok(Value::Decimal(decimal))
                }
            },
            BuiltinType::Date => parse_date(lexical).map(Value::Date),
            BuiltinType::Time => parse_time(lexical).map(Value::Time),
            BuiltinType::DateTime => parse_date_time(lexical).map(Value::Timestamp),
            BuiltinType::Base64Binary => {
                let compact: String = lexical.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map(Value::Bytes)
                    .map_err(|e| e.to_string())
            }
            BuiltinType::HexBinary => hex::decode(lexical)
                .map(Value::Bytes)
                .map_err(|e| e.to_string()),
            BuiltinType::IdRefs | BuiltinType::NmTokens | BuiltinType::Entities => {
                Err("list types are parsed item by item".to_string())
            }
        }
    }
}

fn parse_integer(lexical: &str, min: i128, max: i128) -> Result<i128, String> {
    let value: i128 = lexical.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    if value < min || value > max {
        return Err(format!("value out of range [{}, {}]", min, max));
    }
    Ok(value)
}

fn parse_float(lexical: &str) -> Result<f64, String> {
    match lexical {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ if lexical.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            Err("not a valid floating point number".to_string())
        }
        _ => lexical.parse::<f64>().map_err(|e| e.to_string()),
    }
}

/// Split a trailing `Z` or `+hh:mm` / `-hh:mm` timezone off a date/time lexical
fn split_timezone(lexical: &str) -> Result<(&str, Option<FixedOffset>), String> {
    if let Some(base) = lexical.strip_suffix('Z') {
        return Ok((base, FixedOffset::east_opt(0)));
    }
    let bytes = lexical.as_bytes();
    if bytes.len() > 6 {
        let sign_index = bytes.len() - 6;
        let sign = bytes[sign_index];
        if (sign == b'+' || sign == b'-') && bytes[bytes.len() - 3] == b':' {
            let hours = two_digits(&bytes[sign_index + 1..sign_index + 3])
                .ok_or_else(|| "invalid timezone hours".to_string())?;
            let minutes = two_digits(&bytes[sign_index + 4..])
                .ok_or_else(|| "invalid timezone minutes".to_string())?;
            if hours > 14 || minutes > 59 {
                return Err("timezone out of range".to_string());
            }
            let seconds = (hours * 3600 + minutes * 60) * if sign == b'-' { -1 } else { 1 };
            return Ok((&lexical[..sign_index], FixedOffset::east_opt(seconds)));
        }
    }
    Ok((lexical, None))
}

fn two_digits(bytes: &[u8]) -> Option<i32> {
    match bytes {
        [tens, units] if tens.is_ascii_digit() && units.is_ascii_digit() => {
            Some(i32::from(tens - b'0') * 10 + i32::from(units - b'0'))
        }
        _ => None,
    }
}

fn parse_date(lexical: &str) -> Result<NaiveDate, String> {
    let (base, _) = split_timezone(lexical)?;
    NaiveDate::parse_from_str(base, "%Y-%m-%d").map_err(|e| e.to_string())
}

fn parse_time(lexical: &str) -> Result<NaiveTime, String> {
    let (base, offset) = split_timezone(lexical)?;
    let time = NaiveTime::parse_from_str(base, "%H:%M:%S%.f").map_err(|e| e.to_string())?;
    Ok(match offset {
        Some(offset) => {
            let (utc, _) = time
                .overflowing_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())));
            utc
        }
        None => time,
    })
}

fn parse_date_time(lexical: &str) -> Result<DateTime<Utc>, String> {
    let (base, offset) = split_timezone(lexical)?;
    let naive =
        NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| e.to_string())?;
    match offset {
        Some(offset) => naive
            .and_local_timezone(offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| "ambiguous local time".to_string()),
        None => Ok(naive.and_utc()),
    }
}
