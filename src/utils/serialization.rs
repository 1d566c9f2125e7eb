// Canonical JSON encoding for hashing, plus the pretty JSON used on disk
// A record's id is the digest of these bytes, so every byte here is consensus critical
use crate::error::{MinerError, Result};
use serde::Serialize;
use serde_json::{Number, Value};

/// Encode any serializable record into its canonical byte form
pub fn canonical_bytes<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(record)
        .map_err(|e| MinerError::UnsupportedValue(format!("Cannot encode record: {e}")))?;
    encode_value(&value)
}

/// Encode an already structured record into its canonical byte form
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => write_number(number, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // Keys are ordered by their raw bytes, independent of the map's own ordering
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_number(number: &Number, out: &mut Vec<u8>) -> Result<()> {
    if let Some(n) = number.as_u64() {
        out.extend_from_slice(n.to_string().as_bytes());
    } else if let Some(n) = number.as_i64() {
        out.extend_from_slice(n.to_string().as_bytes());
    } else if number.is_f64() {
        // serde_json prints floats in shortest round-trip form and keeps the ".0"
        out.extend_from_slice(number.to_string().as_bytes());
    } else {
        return Err(MinerError::UnsupportedValue(format!(
            "Number {number} has no canonical form"
        )));
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Render a collection the way it is stored on disk (4-space indented JSON)
pub fn to_pretty_json<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut serializer)
        .map_err(|e| MinerError::Serialization(format!("Serialization failed: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}
