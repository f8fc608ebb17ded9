//! Constraining facets of simple types
//!
//! Facets are collected while a restriction chain is compiled and checked on every
//! lexical value the unmarshaller converts. Patterns use the XSD regular expression
//! dialect, which is translated into the `regex` crate syntax at compile time.

use std::cmp::Ordering;

use regex::Regex;
use serde::Serialize;

use crate::builtins::{BuiltinType, WhiteSpace};
use crate::record::{Decimal, Value};

/// Patterns declared in one derivation step; a value must match at least one of them
#[derive(Debug, Clone, Serialize)]
pub struct PatternSet {
    sources: Vec<String>,
    #[serde(skip)]
    regex: Regex,
}

impl PatternSet {
    fn compile(sources: Vec<String>) -> Result<Self, String> {
        let alternatives = sources
            .iter()
            .map(|source| translate_pattern(source).map(|p| format!("(?:{})", p)))
            .collect::<Result<Vec<_>, _>>()?;
        let regex = Regex::new(&format!("^(?:{})$", alternatives.join("|")))
            .map_err(|e| format!("invalid pattern {:?}: {}", sources, e))?;
        Ok(Self { sources, regex })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn is_match(&self, lexical: &str) -> bool {
        self.regex.is_match(lexical)
    }
}

/// An enumeration member; atomic members are compared in the value space
#[derive(Debug, Clone, Serialize)]
pub struct EnumValue {
    lexical: String,
    #[serde(skip)]
    value: Option<Value>,
}

/// A range facet bound
#[derive(Debug, Clone, Serialize)]
pub struct Bound {
    lexical: String,
    #[serde(skip)]
    value: Value,
}

/// The effective facets of a simple type
#[derive(Debug, Clone, Default, Serialize)]
pub struct Facets {
    #[serde(skip_serializing_if = "Option::is_none")]
    enumeration: Option<Vec<EnumValue>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patterns: Vec<PatternSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_inclusive: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_inclusive: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_exclusive: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_exclusive: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_digits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fraction_digits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    whitespace: Option<WhiteSpace>,
}

impl Facets {
    pub fn is_empty(&self) -> bool {
        self.enumeration.is_none()
            && self.patterns.is_empty()
            && self.length.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min_inclusive.is_none()
            && self.max_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_exclusive.is_none()
            && self.total_digits.is_none()
            && self.fraction_digits.is_none()
            && self.whitespace.is_none()
    }

    pub fn fraction_digits(&self) -> Option<u32> {
        self.fraction_digits
    }

    pub fn whitespace(&self) -> Option<WhiteSpace> {
        self.whitespace
    }

    /// Derive the facets of a restriction from these base facets.
    ///
    /// `atomic` is the primitive built-in of the restricted type, `None` for list and
    /// union types (range and digit facets do not apply to them).
    pub fn restrict(
        &self,
        atomic: Option<BuiltinType>,
        specs: &[(String, String)],
    ) -> Result<Facets, String> {
        let mut derived = self.clone();
        let mut enumeration = Vec::new();
        let mut patterns = Vec::new();

        // fractionDigits changes the decimal scale used to parse enumeration members
        if let Some((_, value)) = specs.iter().find(|(name, _)| name == "fractionDigits") {
            derived.fraction_digits = Some(parse_count(value, "fractionDigits")?);
        }

        for (name, value) in specs {
            match name.as_str() {
                "enumeration" => enumeration.push(value.clone()),
                "pattern" => patterns.push(value.clone()),
                "length" => derived.length = Some(parse_count(value, name)? as usize),
                "minLength" => derived.min_length = Some(parse_count(value, name)? as usize),
                "maxLength" => derived.max_length = Some(parse_count(value, name)? as usize),
                "minInclusive" | "maxInclusive" | "minExclusive" | "maxExclusive" => {
                    let base = atomic
                        .ok_or_else(|| format!("facet {} only applies to atomic types", name))?;
                    let bound = parse_bound(base, value)
                        .map_err(|reason| format!("invalid {} value '{}': {}", name, value, reason))?;
                    let slot = match name.as_str() {
                        "minInclusive" => &mut derived.min_inclusive,
                        "maxInclusive" => &mut derived.max_inclusive,
                        "minExclusive" => &mut derived.min_exclusive,
                        _ => &mut derived.max_exclusive,
                    };
                    *slot = Some(bound);
                }
                "totalDigits" => derived.total_digits = Some(parse_count(value, name)?),
                "fractionDigits" => {}
                "whiteSpace" => {
                    derived.whitespace = Some(
                        WhiteSpace::from_lexical(value)
                            .ok_or_else(|| format!("invalid whiteSpace value '{}'", value))?,
                    )
                }
                other => return Err(format!("unknown facet {}", other)),
            }
        }

        if !enumeration.is_empty() {
            let whitespace = derived
                .whitespace
                .or_else(|| atomic.map(|b| b.whitespace()))
                .unwrap_or(WhiteSpace::Collapse);
            let members = enumeration
                .into_iter()
                .map(|lexical| {
                    let lexical = whitespace.apply(&lexical).into_owned();
                    let value = match atomic {
                        Some(base) => Some(
                            base.parse(&lexical, derived.fraction_digits)
                                .map_err(|reason| {
                                    format!("invalid enumeration value '{}': {}", lexical, reason)
                                })?,
                        ),
                        None => None,
                    };
                    Ok(EnumValue { lexical, value })
                })
                .collect::<Result<Vec<_>, String>>()?;
            derived.enumeration = Some(members);
        }

        if !patterns.is_empty() {
            derived.patterns.push(PatternSet::compile(patterns)?);
        }

        if let (Some(min), Some(max)) = (derived.min_length, derived.max_length)
            && min > max
        {
            return Err(format!("minLength {} exceeds maxLength {}", min, max));
        }

        Ok(derived)
    }

    /// Check a normalized lexical value and its parsed value against every facet
    pub fn check(&self, lexical: &str, value: &Value) -> Result<(), String> {
        for set in &self.patterns {
            if !set.is_match(lexical) {
                return Err(format!("value does not match pattern {:?}", set.sources()));
            }
        }

        if let Some(members) = &self.enumeration {
            let found = members.iter().any(|member| match &member.value {
                Some(expected) => values_equal(expected, value),
                None => member.lexical == lexical,
            });
            if !found {
                let allowed: Vec<&str> = members.iter().map(|m| m.lexical.as_str()).collect();
                return Err(format!("value is not one of {:?}", allowed));
            }
        }

        if let Some(length) = measure(value) {
            if let Some(expected) = self.length
                && length != expected
            {
                return Err(format!("length {} is not {}", length, expected));
            }
            if let Some(min) = self.min_length
                && length < min
            {
                return Err(format!("length {} is less than minLength {}", length, min));
            }
            if let Some(max) = self.max_length
                && length > max
            {
                return Err(format!("length {} exceeds maxLength {}", length, max));
            }
        }

        check_bound(&self.min_inclusive, value, "minInclusive", |o| o != Ordering::Less)?;
        check_bound(&self.max_inclusive, value, "maxInclusive", |o| o != Ordering::Greater)?;
        check_bound(&self.min_exclusive, value, "minExclusive", |o| o == Ordering::Greater)?;
        check_bound(&self.max_exclusive, value, "maxExclusive", |o| o == Ordering::Less)?;

        if self.total_digits.is_some() || self.fraction_digits.is_some() {
            if let Some((total, fraction)) = digit_counts(lexical) {
                if let Some(max) = self.total_digits
                    && total > max as usize
                {
                    return Err(format!("{} digits exceed totalDigits {}", total, max));
                }
                if let Some(max) = self.fraction_digits
                    && fraction > max as usize
                {
                    return Err(format!(
                        "{} fraction digits exceed fractionDigits {}",
                        fraction, max
                    ));
                }
            }
        }

        Ok(())
    }
}

fn parse_count(value: &str, facet: &str) -> Result<u32, String> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid {} value '{}'", facet, value))
}

fn parse_bound(base: BuiltinType, lexical: &str) -> Result<Bound, String> {
    let lexical = lexical.trim();
    let value = match base {
        // bounds keep their own precision; comparison aligns scales
        BuiltinType::Decimal => {
            let scale = lexical
                .split_once('.')
                .map(|(_, fraction)| fraction.len() as u32)
                .unwrap_or(0);
            Value::Decimal(Decimal::parse_with_scale(lexical, scale)?)
        }
        // derived integer types are bounded by their own facets; compare in i64 space
        _ if base.record_kind(None) == crate::record::SchemaKind::Int64 => {
            Value::Int64(lexical.parse::<i64>().map_err(|e| e.to_string())?)
        }
        _ => base.parse(lexical, None)?,
    };
    Ok(Bound {
        lexical: lexical.to_string(),
        value,
    })
}

fn check_bound(
    bound: &Option<Bound>,
    value: &Value,
    facet: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<(), String> {
    let Some(bound) = bound else {
        return Ok(());
    };
    match compare_values(value, &bound.value) {
        Some(ordering) if accept(ordering) => Ok(()),
        Some(_) => Err(format!("value violates {} {}", facet, bound.lexical)),
        None => Err(format!("value is not comparable with {} {}", facet, bound.lexical)),
    }
}

fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Bytes(b) => Some(b.len()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Int8(v) => Some(i128::from(*v)),
        Value::Int16(v) => Some(i128::from(*v)),
        Value::Int32(v) => Some(i128::from(*v)),
        Value::Int64(v) => Some(i128::from(*v)),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(f64::from(*v)),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_values(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Order two values of comparable kinds
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_float(a), as_float(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::Decimal(x), Value::Decimal(y)) => {
            let scale = x.scale().max(y.scale());
            let left = x.unscaled().checked_mul(10i128.checked_pow(scale - x.scale())?)?;
            let right = y.unscaled().checked_mul(10i128.checked_pow(scale - y.scale())?)?;
            Some(left.cmp(&right))
        }
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Significant total and fraction digits of a decimal lexical value
fn digit_counts(lexical: &str) -> Option<(usize, usize)> {
    let unsigned = lexical.trim_start_matches(['+', '-']);
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let integer = integer.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');
    Some(((integer.len() + fraction.len()).max(1), fraction.len()))
}

const NAME_START_CHARS: &str = r"_:A-Za-z\p{L}";
const NAME_CHARS: &str = r"\-._:A-Za-z0-9\p{L}\p{N}";

/// Translate an XSD regular expression into `regex` syntax.
///
/// XSD patterns are implicitly anchored and treat `^` and `$` as literals outside
/// character classes. The multi-character escapes `\i` and `\c` expand to the XML
/// name character classes. Character class subtraction is rejected.
pub fn translate_pattern(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    let mut previous = None;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| format!("pattern '{}' ends with a lone backslash", pattern))?;
                match (escaped, in_class) {
                    ('i', false) => out.push_str(&format!("[{}]", NAME_START_CHARS)),
                    ('i', true) => out.push_str(NAME_START_CHARS),
                    ('c', false) => out.push_str(&format!("[{}]", NAME_CHARS)),
                    ('c', true) => out.push_str(NAME_CHARS),
                    ('I', false) => out.push_str(&format!("[^{}]", NAME_START_CHARS)),
                    ('C', false) => out.push_str(&format!("[^{}]", NAME_CHARS)),
                    ('I' | 'C', true) => {
                        return Err(format!(
                            "negated name escapes inside a character class are not supported in '{}'",
                            pattern
                        ));
                    }
                    (other, _) => {
                        out.push('\\');
                        out.push(other);
                    }
                }
                previous = Some(escaped);
                continue;
            }
            '[' if in_class => {
                if previous == Some('-') {
                    return Err(format!(
                        "character class subtraction is not supported in '{}'",
                        pattern
                    ));
                }
                out.push_str(r"\[");
            }
            '[' => {
                in_class = true;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '-' if in_class && chars.peek() == Some(&'-') => out.push_str(r"\-"),
            '^' | '$' if !in_class => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        previous = Some(c);
    }

    if in_class {
        return Err(format!("unterminated character class in '{}'", pattern));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pattern_translation() {
        assert_eq!(translate_pattern(r"[A-Z]{2}\d+").unwrap(), r"[A-Z]{2}\d+");
        assert_eq!(translate_pattern("a$b^").unwrap(), r"a\$b\^");
        assert_eq!(translate_pattern("[^a-c]").unwrap(), "[^a-c]");
        assert!(translate_pattern(r"\i\c*").unwrap().starts_with("[_:"));
        assert!(translate_pattern("[a-z-[aeiou]]").is_err());
        assert!(translate_pattern("[abc").is_err());
    }

    #[test]
    fn test_patterns_are_anchored() {
        let facets = Facets::default()
            .restrict(Some(BuiltinType::String), &specs(&[("pattern", "[A-Z]{2}")]))
            .unwrap();
        let ok = Value::String("AB".to_string());
        assert!(facets.check("AB", &ok).is_ok());
        let too_long = Value::String("ABC".to_string());
        assert!(facets.check("ABC", &too_long).is_err());
    }

    #[test]
    fn test_patterns_across_steps_all_apply() {
        let base = Facets::default()
            .restrict(Some(BuiltinType::String), &specs(&[("pattern", "[a-z]+")]))
            .unwrap();
        let derived = base
            .restrict(Some(BuiltinType::String), &specs(&[("pattern", "a.*"), ("pattern", "b.*")]))
            .unwrap();
        assert!(derived.check("abc", &Value::String("abc".into())).is_ok());
        assert!(derived.check("bcd", &Value::String("bcd".into())).is_ok());
        assert!(derived.check("cde", &Value::String("cde".into())).is_err());
        assert!(derived.check("B", &Value::String("B".into())).is_err());
    }

    #[test]
    fn test_enumeration_in_value_space() {
        let facets = Facets::default()
            .restrict(Some(BuiltinType::Int), &specs(&[("enumeration", "1"), ("enumeration", "2")]))
            .unwrap();
        assert!(facets.check("+1", &Value::Int32(1)).is_ok());
        assert!(facets.check("3", &Value::Int32(3)).is_err());

        let colors = Facets::default()
            .restrict(
                Some(BuiltinType::String),
                &specs(&[("enumeration", "red"), ("enumeration", "green")]),
            )
            .unwrap();
        assert!(colors.check("red", &Value::String("red".into())).is_ok());
        assert!(colors.check("blue", &Value::String("blue".into())).is_err());
    }

    #[test]
    fn test_length_and_range_facets() {
        let facets = Facets::default()
            .restrict(
                Some(BuiltinType::String),
                &specs(&[("minLength", "2"), ("maxLength", "3")]),
            )
            .unwrap();
        assert!(facets.check("ab", &Value::String("ab".into())).is_ok());
        assert!(facets.check("a", &Value::String("a".into())).is_err());
        assert!(facets.check("abcd", &Value::String("abcd".into())).is_err());

        let range = Facets::default()
            .restrict(
                Some(BuiltinType::Int),
                &specs(&[("minInclusive", "1"), ("maxExclusive", "10")]),
            )
            .unwrap();
        assert!(range.check("1", &Value::Int32(1)).is_ok());
        assert!(range.check("0", &Value::Int32(0)).is_err());
        assert!(range.check("10", &Value::Int32(10)).is_err());

        assert!(
            Facets::default()
                .restrict(Some(BuiltinType::String), &specs(&[("minLength", "3"), ("maxLength", "1")]))
                .is_err()
        );
    }

    #[test]
    fn test_decimal_digits_and_bounds() {
        let facets = Facets::default()
            .restrict(
                Some(BuiltinType::Decimal),
                &specs(&[
                    ("totalDigits", "5"),
                    ("fractionDigits", "2"),
                    ("minInclusive", "0.5"),
                ]),
            )
            .unwrap();
        assert_eq!(facets.fraction_digits(), Some(2));

        let ok = Value::Decimal(Decimal::parse_with_scale("123.45", 2).unwrap());
        assert!(facets.check("123.45", &ok).is_ok());

        let small = Value::Decimal(Decimal::parse_with_scale("0.25", 2).unwrap());
        assert!(facets.check("0.25", &small).is_err());

        let wide = Value::Decimal(Decimal::parse_with_scale("1234.5", 2).unwrap());
        assert!(facets.check("1234.5", &wide).is_ok());
        let too_wide = Value::Decimal(Decimal::parse_with_scale("12345.6", 2).unwrap());
        assert!(facets.check("12345.6", &too_wide).is_err());
    }

    #[test]
    fn test_invalid_facets_are_rejected() {
        assert!(
            Facets::default()
                .restrict(Some(BuiltinType::Int), &specs(&[("maxInclusive", "abc")]))
                .is_err()
        );
        assert!(
            Facets::default()
                .restrict(None, &specs(&[("minInclusive", "1")]))
                .is_err()
        );
        assert!(
            Facets::default()
                .restrict(Some(BuiltinType::String), &specs(&[("whiteSpace", "squash")]))
                .is_err()
        );
        assert!(
            Facets::default()
                .restrict(Some(BuiltinType::String), &specs(&[("bogus", "1")]))
                .is_err()
        );
    }
}
