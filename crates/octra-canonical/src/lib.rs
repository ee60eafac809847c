//! Octra Canonical - deterministic encoding for everything signed or hashed.
//!
//! Issuer and verifier are independent implementations; a signature only
//! verifies if both reproduce the exact same bytes for structurally equal
//! input. This crate is that contract: a whitespace-free, key-sorted,
//! JSON-shaped text encoding.
//!
//! # Rules
//!
//! - `null` for null, `true`/`false` for booleans
//! - numbers in their shortest decimal rendering; non-finite numbers are
//!   unrepresentable (rejected at construction)
//! - strings JSON-escaped and quoted
//! - byte sequences as quoted lowercase hex with a `0x` prefix
//! - arrays bracketed, element order preserved
//! - maps braced, keys sorted ascending by code point
//! - no whitespace anywhere
//!
//! # Example
//!
//! ```
//! use octra_canonical::{Value, canonicalize};
//!
//! let value = Value::map([
//!     ("b", Value::from(1u64)),
//!     ("a", Value::Bytes(vec![0xde, 0xad])),
//! ]);
//! assert_eq!(canonicalize(&value), r#"{"a":"0xdead","b":1}"#);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod value;

pub use error::{CanonicalError, CanonicalResult};
pub use value::Value;

/// Render a value in canonical form.
///
/// Calling this twice on structurally equal input always yields
/// byte-identical output, independent of how the input was constructed.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(out, s),
        Value::Bytes(bytes) => {
            out.push('"');
            out.push_str("0x");
            out.push_str(&hex::encode(bytes));
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            // BTreeMap iterates in ascending code-point order.
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(out, key);
                out.push(':');
                write_value(out, val);
            }
            out.push('}');
        }
    }
}

fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
