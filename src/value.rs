//! Runtime values observed while evaluating assertion expressions.
//!
//! Every leaf of an assertion tree (a captured variable, a literal constant)
//! produces a [`Value`], and every failure report formats one back into
//! source-like text. The formatting rules here are what make a failure
//! message read like the code that produced it: strings come back quoted and
//! escaped, booleans as `true`/`false`, type operands as `typeof(T)`.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// A runtime value produced by evaluating a sub-expression.
///
/// The set is deliberately small: it covers what boolean assertion
/// expressions actually compare. Structured data uses `List` and `Object`;
/// everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// The absent value (`??` coalesces over it, dereferencing it faults).
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A date/time constant, rendered in ISO-8601 `yyyy-MM-ddTHH:mm:ss` form.
    DateTime(NaiveDateTime),
    /// A type used as a value, rendered as `typeof(T)`.
    Type(String),
    List(Vec<Value>),
    Object {
        type_name: String,
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    /// The runtime type name of this value, as shown in `is`-check reports.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::DateTime(_) => "DateTime",
            Value::Type(_) => "Type",
            Value::List(_) => "List",
            Value::Object { type_name, .. } => type_name,
        }
    }

    /// Whether this value counts as a primitive for the renderer's
    /// "interesting target" rule: literal receivers like `"1".Trim()` or
    /// `1.ToString()` keep their prefix, synthetic captures do not.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Extract a boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Plain text conversion, the `ToString()` view: strings come back raw
    /// (no quotes, no escapes), everything else matches [`format_value`].
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => format_value(other),
        }
    }
}

/// Format a value the way it would appear in assertion source text.
///
/// This is the canonical table used for rendered constants and for the
/// "but was:" slot of a report:
///
/// - booleans as `true` / `false`
/// - date/times in ISO-8601 `yyyy-MM-ddTHH:mm:ss`
/// - strings double-quoted with control characters escaped
/// - types as `typeof(T)`
/// - everything else via its default textual conversion
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => format!("\"{}\"", escape_string(s)),
        Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        Value::Type(name) => format!("typeof({})", display_type_name(name)),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object { type_name, fields } => {
            let rendered: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{} = {}", name, format_value(value)))
                .collect();
            format!("{} {{ {} }}", type_name, rendered.join(", "))
        }
    }
}

/// Escape a string for source-like display.
///
/// Escapes `"` and `\`, plus the control characters that have canonical
/// two-character escapes: NUL, BEL, BS, TAB, LF, VT, FF, CR.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_string`]. Returns `None` on a dangling or unknown escape.
pub fn unescape_string(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'v' => out.push('\x0b'),
            'f' => out.push('\x0c'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

/// Normalize a declared type name for display.
///
/// Well-known scalar names map to their short keyword form; everything else
/// passes through as its bare name, never namespace-qualified.
pub fn display_type_name(name: &str) -> &str {
    match name {
        "String" => "string",
        "Int32" | "Int64" => "int",
        "Double" | "Single" => "double",
        "Boolean" => "bool",
        other => other,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object {
                type_name: "object".to_string(),
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_format_booleans() {
        assert_eq!(format_value(&Value::Bool(true)), "true");
        assert_eq!(format_value(&Value::Bool(false)), "false");
    }

    #[test]
    fn test_format_datetime_iso8601() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap();
        assert_eq!(format_value(&Value::DateTime(dt)), "2024-03-07T09:30:05");
    }

    #[test]
    fn test_format_string_quotes_and_escapes() {
        assert_eq!(format_value(&Value::Str("hi".into())), "\"hi\"");
        assert_eq!(
            format_value(&Value::Str("a\tb\nc".into())),
            "\"a\\tb\\nc\""
        );
        assert_eq!(
            format_value(&Value::Str("say \"hi\"".into())),
            "\"say \\\"hi\\\"\""
        );
        assert_eq!(format_value(&Value::Str("a\0b".into())), "\"a\\0b\"");
    }

    #[test]
    fn test_format_type_value() {
        assert_eq!(format_value(&Value::Type("String".into())), "typeof(string)");
        assert_eq!(format_value(&Value::Type("Foo".into())), "typeof(Foo)");
    }

    #[test]
    fn test_format_list_and_object() {
        let list = Value::from(vec![1, 2, 3]);
        assert_eq!(format_value(&list), "[1, 2, 3]");

        let obj = Value::from(json!({"X": 1, "Y": "a"}));
        assert_eq!(format_value(&obj), "object { X = 1, Y = \"a\" }");
    }

    #[test]
    fn test_to_text_strings_are_unquoted() {
        assert_eq!(Value::Str("hi".into()).to_text(), "hi");
        assert_eq!(Value::Int(7).to_text(), "7");
    }

    #[test]
    fn test_display_type_name_normalization() {
        assert_eq!(display_type_name("String"), "string");
        assert_eq!(display_type_name("Int32"), "int");
        assert_eq!(display_type_name("Widget"), "Widget");
    }

    #[test]
    fn test_unescape_inverts_escape() {
        let original = "tab\t newline\n bell\x07 quote\" slash\\ vt\x0b";
        assert_eq!(
            unescape_string(&escape_string(original)).as_deref(),
            Some(original)
        );
    }

    #[test]
    fn test_unescape_rejects_dangling_escape() {
        assert_eq!(unescape_string("oops\\"), None);
        assert_eq!(unescape_string("\\q"), None);
    }

    #[test]
    fn test_is_primitive() {
        assert!(Value::Int(1).is_primitive());
        assert!(Value::Str("x".into()).is_primitive());
        assert!(!Value::Null.is_primitive());
        assert!(!Value::from(vec![1]).is_primitive());
    }

    proptest! {
        #[test]
        fn prop_escape_roundtrip(s in "[ -~\t\n\r\x00\x07\x08\x0b\x0c\"\\\\]*") {
            prop_assert_eq!(unescape_string(&escape_string(&s)), Some(s));
        }

        #[test]
        fn prop_escape_roundtrip_any_string(s in ".*") {
            prop_assert_eq!(unescape_string(&escape_string(&s)), Some(s));
        }
    }
}
