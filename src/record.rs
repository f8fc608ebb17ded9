//! Structured Record model
//!
//! A [`StructuredRecord`] pairs a self-describing [`Schema`] with a [`Value`] that
//! conforms to it. The schema kinds follow the usual row-oriented wire formats:
//! fixed-width integers, floats, strings, bytes, a handful of logical types and
//! the two container kinds (arrays and structs).
//!
//! Values are checked against their schema when they are inserted into a
//! [`Struct`], and a record is only built from a struct whose required fields
//! are all present.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{Result, TransformError};

/// Kind of a schema node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
    Decimal { scale: u32 },
    Date,
    Time,
    Timestamp,
    Array { items: Arc<Schema> },
    Struct { fields: Vec<Field> },
}

/// A self-describing schema node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    #[serde(flatten)]
    kind: SchemaKind,
    optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<String>,
}

/// One named field of a struct schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    #[serde(rename = "field")]
    name: String,
    #[serde(skip)]
    index: usize,
    #[serde(flatten)]
    schema: Arc<Schema>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl Schema {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
            name: None,
            doc: None,
        }
    }

    pub fn array(items: Arc<Schema>) -> Self {
        Self::new(SchemaKind::Array { items })
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Fields of a struct schema, empty for every other kind
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            SchemaKind::Struct { fields } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|field| field.name == name)
    }

    /// Item schema of an array schema
    pub fn items(&self) -> Option<&Arc<Schema>> {
        match &self.kind {
            SchemaKind::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Short type label used in error messages
    pub fn type_label(&self) -> &'static str {
        match self.kind {
            SchemaKind::Int8 => "int8",
            SchemaKind::Int16 => "int16",
            SchemaKind::Int32 => "int32",
            SchemaKind::Int64 => "int64",
            SchemaKind::Float32 => "float32",
            SchemaKind::Float64 => "float64",
            SchemaKind::Boolean => "boolean",
            SchemaKind::String => "string",
            SchemaKind::Bytes => "bytes",
            SchemaKind::Decimal { .. } => "decimal",
            SchemaKind::Date => "date",
            SchemaKind::Time => "time",
            SchemaKind::Timestamp => "timestamp",
            SchemaKind::Array { .. } => "array",
            SchemaKind::Struct { .. } => "struct",
        }
    }
}

/// Builder for struct schemas; assigns field indexes in insertion order
#[derive(Debug, Default)]
pub struct StructSchemaBuilder {
    name: Option<String>,
    doc: Option<String>,
    optional: bool,
    fields: Vec<Field>,
}

impl StructSchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Arc<Schema>>) -> Result<Self> {
        let name = name.into();
        if self.fields.iter().any(|field| field.name == name) {
            return Err(TransformError::Data(format!(
                "duplicate field '{}' in struct schema {}",
                name,
                self.name.as_deref().unwrap_or("<anonymous>")
            )));
        }
        let index = self.fields.len();
        self.fields.push(Field {
            name,
            index,
            schema: schema.into(),
        });
        Ok(self)
    }

    pub fn build(self) -> Schema {
        Schema {
            kind: SchemaKind::Struct {
                fields: self.fields,
            },
            optional: self.optional,
            name: self.name,
            doc: self.doc,
        }
    }
}

/// Fixed-scale decimal number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    unscaled: i128,
    scale: u32,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u32) -> Self {
        Self { unscaled, scale }
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Parse a lexical decimal (`-12.50`, `+3`, `.5`) into the given scale.
    ///
    /// Fails when the value carries more significant fractional digits than the scale allows.
    pub fn parse_with_scale(lexical: &str, scale: u32) -> std::result::Result<Self, String> {
        let digits = DecimalDigits::parse(lexical)?;
        if digits.fraction.len() > scale as usize {
            return Err(format!(
                "{} fractional digits exceed scale {}",
                digits.fraction.len(),
                scale
            ));
        }
        digits.to_scale(scale)
    }

    /// Parse into the given scale, rounding half to even when the value is more precise.
    ///
    /// The flag is `true` when digits were dropped.
    pub fn parse_rounded(lexical: &str, scale: u32) -> std::result::Result<(Self, bool), String> {
        let digits = DecimalDigits::parse(lexical)?;
        if digits.fraction.len() <= scale as usize {
            return digits.to_scale(scale).map(|d| (d, false));
        }

        let (kept, dropped) = digits.fraction.split_at(scale as usize);
        let truncated = DecimalDigits {
            negative: digits.negative,
            integer: digits.integer,
            fraction: kept,
        };
        let mut magnitude = truncated.magnitude(scale)?;
        let round_up = match dropped.as_bytes() {
            [first, ..] if *first > b'5' => true,
            [b'5', rest @ ..] => rest.iter().any(|b| *b != b'0') || magnitude % 2 == 1,
            _ => false,
        };
        if round_up {
            magnitude = magnitude
                .checked_add(1)
                .ok_or_else(|| "value out of range".to_string())?;
        }
        let unscaled = if digits.negative { -magnitude } else { magnitude };
        Ok((Self { unscaled, scale }, true))
    }
}

/// Sign and digit runs of a lexical decimal; `fraction` has trailing zeros removed
struct DecimalDigits<'a> {
    negative: bool,
    integer: &'a str,
    fraction: &'a str,
}

impl<'a> DecimalDigits<'a> {
    fn parse(lexical: &'a str) -> std::result::Result<Self, String> {
        let (negative, digits) = match lexical.as_bytes().first() {
            Some(b'-') => (true, &lexical[1..]),
            Some(b'+') => (false, &lexical[1..]),
            _ => (false, lexical),
        };
        let (integer, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if integer.is_empty() && fraction.is_empty() {
            return Err("no digits".to_string());
        }
        if !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err("not a decimal number".to_string());
        }
        Ok(Self {
            negative,
            integer,
            fraction: fraction.trim_end_matches('0'),
        })
    }

    /// Absolute unscaled value; `fraction` must fit in `scale`
    fn magnitude(&self, scale: u32) -> std::result::Result<i128, String> {
        let padding = scale as usize - self.fraction.len();
        let mut unscaled: i128 = 0;
        let digits = self
            .integer
            .bytes()
            .chain(self.fraction.bytes())
            .chain(std::iter::repeat_n(b'0', padding));
        for digit in digits {
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(digit - b'0')))
                .ok_or_else(|| "value out of range".to_string())?;
        }
        Ok(unscaled)
    }

    fn to_scale(&self, scale: u32) -> std::result::Result<Decimal, String> {
        let magnitude = self.magnitude(scale)?;
        let unscaled = if self.negative { -magnitude } else { magnitude };
        Ok(Decimal { unscaled, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let magnitude = self.unscaled.unsigned_abs().to_string();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let scale = self.scale as usize;
        let padded = format!("{:0>width$}", magnitude, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

/// A value conforming to a [`Schema`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Struct(Struct),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Check that this value conforms to `schema`
    pub fn validate(&self, schema: &Schema) -> std::result::Result<(), String> {
        match (self, schema.kind()) {
            (Value::Null, _) if schema.is_optional() => Ok(()),
            (Value::Null, _) => Err(format!(
                "null value for required {} schema",
                schema.type_label()
            )),
            (Value::Int8(_), SchemaKind::Int8)
            | (Value::Int16(_), SchemaKind::Int16)
            | (Value::Int32(_), SchemaKind::Int32)
            | (Value::Int64(_), SchemaKind::Int64)
            | (Value::Float32(_), SchemaKind::Float32)
            | (Value::Float64(_), SchemaKind::Float64)
            | (Value::Boolean(_), SchemaKind::Boolean)
            | (Value::String(_), SchemaKind::String)
            | (Value::Bytes(_), SchemaKind::Bytes)
            | (Value::Date(_), SchemaKind::Date)
            | (Value::Time(_), SchemaKind::Time)
            | (Value::Timestamp(_), SchemaKind::Timestamp) => Ok(()),
            (Value::Decimal(d), SchemaKind::Decimal { scale }) if d.scale() == *scale => Ok(()),
            (Value::Decimal(d), SchemaKind::Decimal { scale }) => Err(format!(
                "decimal scale {} does not match schema scale {}",
                d.scale(),
                scale
            )),
            (Value::Array(items), SchemaKind::Array { items: item_schema }) => {
                items.iter().try_for_each(|item| item.validate(item_schema))
            }
            (Value::Struct(s), SchemaKind::Struct { .. }) => {
                if s.schema().as_ref() != schema && s.schema().fields() != schema.fields() {
                    return Err(format!(
                        "struct schema {} does not match {}",
                        s.schema().name().unwrap_or("<anonymous>"),
                        schema.name().unwrap_or("<anonymous>")
                    ));
                }
                s.validate_required()
            }
            (value, _) => Err(format!(
                "{} value does not match {} schema",
                value.type_label(),
                schema.type_label()
            )),
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Float32(v) => serializer.serialize_f32(*v),
            Value::Float64(v) => serializer.serialize_f64(*v),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(v))
            }
            Value::Decimal(v) => serializer.collect_str(v),
            Value::Date(v) => serializer.collect_str(&v.format("%Y-%m-%d")),
            Value::Time(v) => serializer.collect_str(&v.format("%H:%M:%S%.f")),
            Value::Timestamp(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Struct(s) => s.serialize(serializer),
        }
    }
}

/// A struct value: one slot per field of its schema
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Struct {
    pub fn new(schema: Arc<Schema>) -> Result<Self> {
        if !matches!(schema.kind(), SchemaKind::Struct { .. }) {
            return Err(TransformError::Data(format!(
                "cannot create a struct from a {} schema",
                schema.type_label()
            )));
        }
        let values = vec![Value::Null; schema.fields().len()];
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Set a field, validating the value against the field schema
    pub fn put(&mut self, field_name: &str, value: Value) -> Result<&mut Self> {
        let field = self.schema.field(field_name).ok_or_else(|| {
            TransformError::Data(format!(
                "{} is not a valid field name of {}",
                field_name,
                self.schema.name().unwrap_or("<anonymous>")
            ))
        })?;
        value.validate(field.schema()).map_err(|reason| {
            TransformError::Data(format!("invalid value for field {}: {}", field_name, reason))
        })?;
        let index = field.index();
        self.values[index] = value;
        Ok(self)
    }

    pub fn get(&self, field_name: &str) -> Option<&Value> {
        self.schema
            .field(field_name)
            .map(|field| &self.values[field.index()])
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Ensure every required field carries a value
    pub fn validate(&self) -> Result<()> {
        self.validate_required().map_err(TransformError::Data)
    }

    fn validate_required(&self) -> std::result::Result<(), String> {
        for field in self.schema.fields() {
            let value = &self.values[field.index()];
            if value.is_null() && !field.schema().is_optional() {
                return Err(format!(
                    "required field {} of {} is missing",
                    field.name(),
                    self.schema.name().unwrap_or("<anonymous>")
                ));
            }
        }
        Ok(())
    }
}

impl Serialize for Struct {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = self.schema.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for field in fields {
            map.serialize_entry(field.name(), &self.values[field.index()])?;
        }
        map.end()
    }
}

/// A schema plus a value conforming to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRecord {
    schema: Arc<Schema>,
    #[serde(rename = "payload")]
    value: Value,
}

impl StructuredRecord {
    pub fn new(schema: Arc<Schema>, value: Value) -> Result<Self> {
        value
            .validate(&schema)
            .map_err(|reason| TransformError::Data(format!("record does not match schema: {}", reason)))?;
        Ok(Self { schema, value })
    }

    /// Build a record from a complete struct value
    pub fn from_struct(value: Struct) -> Result<Self> {
        value.validate()?;
        Ok(Self {
            schema: Arc::clone(value.schema()),
            value: Value::Struct(value),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        self.value.as_struct()
    }

    /// Look up a value by a dotted field path, e.g. `Item.qty`
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.value;
        for segment in path.split('.') {
            current = current.as_struct()?.get(segment)?;
        }
        Some(current)
    }

    pub fn into_parts(self) -> (Arc<Schema>, Value) {
        (self.schema, self.value)
    }
}
