//! Property-list serialization of message payloads.
//!
//! Messages are encoded as binary property lists (`bplist00`). Decoding
//! accepts any property-list encoding but insists on a top-level dictionary.
//! This is the only module that knows about the `plist` crate.

use std::io::Cursor;

use crate::error::{MessageError, Result};
use crate::value::{Dictionary, Value};

/// Encode a dictionary as a binary property list.
pub fn serialize(dict: &Dictionary) -> Result<Vec<u8>> {
    let root = plist::Value::Dictionary(to_plist_dict(dict));
    let mut out = Vec::new();
    root.to_writer_binary(&mut out)
        .map_err(|e| MessageError::Encode(e.to_string()))?;
    Ok(out)
}

/// Decode a complete, buffered property list into a dictionary.
pub fn deserialize(bytes: &[u8]) -> Result<Dictionary> {
    let root = plist::Value::from_reader(Cursor::new(bytes))
        .map_err(|e| MessageError::Malformed(e.to_string()))?;
    match from_plist(root)? {
        Value::Dictionary(dict) => Ok(dict),
        other => Err(MessageError::Malformed(format!(
            "top-level value is {}, expected dictionary",
            other.type_name()
        ))),
    }
}

fn to_plist_dict(dict: &Dictionary) -> plist::Dictionary {
    let mut out = plist::Dictionary::new();
    for (key, value) in dict {
        out.insert(key.clone(), to_plist(value));
    }
    out
}

fn to_plist(value: &Value) -> plist::Value {
    match value {
        Value::String(s) => plist::Value::String(s.clone()),
        Value::Integer(i) => plist::Value::Integer((*i).into()),
        Value::Unsigned(u) => plist::Value::Integer((*u).into()),
        Value::Real(r) => plist::Value::Real(*r),
        Value::Boolean(b) => plist::Value::Boolean(*b),
        Value::Array(items) => plist::Value::Array(items.iter().map(to_plist).collect()),
        Value::Dictionary(dict) => plist::Value::Dictionary(to_plist_dict(dict)),
        Value::Data(bytes) => plist::Value::Data(bytes.clone()),
    }
}

fn from_plist(value: plist::Value) -> Result<Value> {
    Ok(match value {
        plist::Value::String(s) => Value::String(s),
        plist::Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
            (Some(v), _) => Value::Integer(v),
            (None, Some(u)) => Value::Unsigned(u),
            (None, None) => {
                return Err(MessageError::Malformed(format!(
                    "integer {i} out of range"
                )))
            }
        },
        plist::Value::Real(r) => Value::Real(r),
        plist::Value::Boolean(b) => Value::Boolean(b),
        plist::Value::Data(bytes) => Value::Data(bytes),
        plist::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_plist)
                .collect::<Result<Vec<_>>>()?,
        ),
        plist::Value::Dictionary(dict) => {
            let mut out = Dictionary::new();
            for (key, value) in dict {
                out.insert(key, from_plist(value)?);
            }
            Value::Dictionary(out)
        }
        other => {
            return Err(MessageError::Malformed(format!(
                "unsupported property-list value {other:?}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        let mut nested = Dictionary::new();
        nested.insert("ChipID".into(), Value::Integer(0x8012));
        nested.insert("HasSEP".into(), Value::Boolean(true));

        let mut dict = Dictionary::new();
        dict.insert("Command".into(), Value::Integer(3));
        dict.insert("Name".into(), Value::from("bridge"));
        dict.insert("Ratio".into(), Value::Real(0.5));
        dict.insert("Keys".into(), ["ChipID", "HasSEP"].into_iter().collect());
        dict.insert("Answers".into(), Value::Dictionary(nested));
        dict.insert("Nonce".into(), Value::Data(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        dict.insert("Negative".into(), Value::Integer(-42));
        dict
    }

    #[test]
    fn serializes_binary_plist() {
        let bytes = serialize(&sample()).unwrap();
        assert!(bytes.starts_with(b"bplist00"));
    }

    #[test]
    fn nested_values_survive_roundtrip() {
        let dict = sample();
        let decoded = deserialize(&serialize(&dict).unwrap()).unwrap();
        assert_eq!(decoded, dict);
    }

    #[test]
    fn accepts_xml_plist() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0"><dict><key>Command</key><integer>6</integer></dict></plist>"#;
        let dict = deserialize(xml).unwrap();
        assert_eq!(dict.get("Command"), Some(&Value::Integer(6)));
    }

    #[test]
    fn integers_above_i64_decode_as_unsigned() {
        let mut root = plist::Dictionary::new();
        root.insert("UniqueChipID".into(), plist::Value::Integer(u64::MAX.into()));
        root.insert("BoardId".into(), plist::Value::Integer(8u64.into()));
        let mut out = Vec::new();
        plist::Value::Dictionary(root)
            .to_writer_binary(&mut out)
            .unwrap();

        let dict = deserialize(&out).unwrap();
        assert_eq!(dict.get("UniqueChipID"), Some(&Value::Unsigned(u64::MAX)));
        assert_eq!(dict.get("BoardId"), Some(&Value::Integer(8)));

        let again = deserialize(&serialize(&dict).unwrap()).unwrap();
        assert_eq!(again, dict);
    }

    #[test]
    fn rejects_non_dictionary_root() {
        let mut out = Vec::new();
        plist::Value::Array(vec![plist::Value::Boolean(true)])
            .to_writer_binary(&mut out)
            .unwrap();
        let err = deserialize(&out).unwrap_err();
        assert!(matches!(err, MessageError::Malformed(msg) if msg.contains("array")));
    }

    #[test]
    fn rejects_garbage() {
        let err = deserialize(b"not a property list at all").unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
    }

    #[test]
    fn rejects_truncated_binary_plist() {
        let bytes = serialize(&sample()).unwrap();
        let err = deserialize(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
    }
}
