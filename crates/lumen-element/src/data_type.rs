//! Property data types
//!
//! Custom property types beyond the built-in boolean, string and object
//! kinds. A data type decides which values it accepts and how attribute text
//! maps to a property value.

use std::fmt;

use lumen_dom::Value;

/// A custom property type
pub trait DataType {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Whether `value` is acceptable; invalid values fall back to the default
    fn is_valid(&self, value: &Value) -> bool;

    /// Property value for an attribute change (`None` when removed)
    fn from_attribute(&self, attribute: Option<&str>) -> Value {
        match attribute {
            Some(text) => Value::String(text.to_string()),
            None => Value::Null,
        }
    }
}

impl fmt::Debug for dyn DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataType").field(&self.name()).finish()
    }
}

/// Whole numbers. Attribute text is parsed leniently: leading digits count,
/// anything else becomes `NaN` and is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

impl DataType for Integer {
    fn name(&self) -> &str {
        "Integer"
    }

    fn is_valid(&self, value: &Value) -> bool {
        matches!(value, Value::Number(n) if n.is_finite() && n.fract() == 0.0)
    }

    fn from_attribute(&self, attribute: Option<&str>) -> Value {
        Value::Number(attribute.map_or(f64::NAN, parse_int))
    }
}

/// Leading integer of `text`, `NaN` when there is none
fn parse_int(text: &str) -> f64 {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<f64>() {
        Ok(n) => sign * n,
        Err(_) => f64::NAN,
    }
}

/// Strings from a fixed set of allowed values
#[derive(Debug, Clone)]
pub struct Enumeration {
    name: String,
    values: Vec<String>,
}

impl Enumeration {
    pub fn new<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl DataType for Enumeration {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self, value: &Value) -> bool {
        value.as_str().is_some_and(|s| self.values.iter().any(|v| v == s))
    }
}
