//! Tolerant decoding of Slurm JSON scalars.
//!
//! Depending on the Slurm release, a scalar field may be a bare value
//! (`"job_id": 42`), a wrapper (`"job_id": {"set": true, "infinite": false,
//! "number": 42}`), or type-confused (`{"number": "42"}`, `"name": 123`).
//! Decoding here never fails; anything unreadable becomes an empty value.

use serde_json::{Map, Value};

const WRAPPER_KEYS: [&str; 4] = ["set", "infinite", "number", "string"];

/// Best-effort reading of one scalar field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TolerantValue {
    /// Text form of the value, empty when nothing could be read.
    pub text: String,
    /// Integer form, when the value is numeric (floats are truncated).
    pub number: Option<i64>,
    /// Wrapper `set` flag. Bare values count as set when present.
    pub set: bool,
    /// Wrapper `infinite` flag.
    pub infinite: bool,
    /// Whether the value arrived inside a `{set, infinite, ...}` wrapper.
    pub wrapped: bool,
}

impl TolerantValue {
    /// Decode an optional JSON node.
    pub fn decode(node: Option<&Value>) -> Self {
        match node {
            Some(Value::Object(map)) if is_wrapper(map) => Self::from_wrapper(map),
            Some(value) => {
                let (text, number) = decode_scalar(value);
                let set = !text.is_empty() || number.is_some();
                Self {
                    text,
                    number,
                    set,
                    ..Self::default()
                }
            }
            None => Self::default(),
        }
    }

    fn from_wrapper(map: &Map<String, Value>) -> Self {
        let payload = map
            .get("number")
            .filter(|v| !v.is_null())
            .or_else(|| map.get("string").filter(|v| !v.is_null()));
        let (text, number) = payload.map(decode_scalar).unwrap_or_default();

        // A wrapper without a `set` key is set exactly when it carries a payload
        let set = match map.get("set") {
            Some(flag) => lenient_bool(flag),
            None => payload.is_some(),
        };
        let infinite = map.get("infinite").map(lenient_bool).unwrap_or(false);

        Self {
            text,
            number,
            set,
            infinite,
            wrapped: true,
        }
    }

    /// Whether the field carries nothing usable.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.number.is_none() && !self.infinite
    }
}

/// Decode a field expected to be a string.
pub fn tolerant_string(node: Option<&Value>) -> String {
    TolerantValue::decode(node).text
}

/// Decode a field expected to be an integer.
pub fn tolerant_int(node: Option<&Value>) -> Option<i64> {
    TolerantValue::decode(node).number
}

/// Decode a field that may be a string, a wrapped string, or an array of
/// either, into trimmed non-empty entries in order.
pub fn tolerant_string_list(node: Option<&Value>) -> Vec<String> {
    match node {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| TolerantValue::decode(Some(item)).text.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        other => {
            let text = TolerantValue::decode(other).text;
            let text = text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    }
}

fn is_wrapper(map: &Map<String, Value>) -> bool {
    WRAPPER_KEYS.iter().any(|key| map.contains_key(*key))
}

/// Read a flag that should be a bool but may be a number or a string.
fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Decode a bare scalar to `(text, integer)`.
fn decode_scalar(value: &Value) -> (String, Option<i64>) {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (trimmed.to_string(), parse_number(trimmed))
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => (i.to_string(), Some(i)),
            None => match n.as_u64() {
                Some(u) => (u.to_string(), i64::try_from(u).ok()),
                None => {
                    let truncated = n.as_f64().and_then(truncate);
                    match truncated {
                        Some(i) => (i.to_string(), Some(i)),
                        None => (n.to_string(), None),
                    }
                }
            },
        },
        Value::Bool(b) => (b.to_string(), None),
        _ => (String::new(), None),
    }
}

/// Parse an integer, falling back to a truncated float.
fn parse_number(s: &str) -> Option<i64> {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(truncate))
}

fn truncate(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}
