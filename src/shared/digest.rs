use serde_json::Value;
use sha2::{Digest, Sha256};

pub const SHA256_HEX_LEN: usize = 64;
pub const SHORT_ID_LEN: usize = 16;

pub fn sha256_hex(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}

pub fn is_sha256_hex(raw: &str) -> bool {
    raw.len() == SHA256_HEX_LEN && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Key-sorted, whitespace-free JSON. Object keys are re-sorted explicitly so the form
/// does not depend on how `serde_json::Map` happens to be backed.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out.into_bytes()
}

pub fn canonical_sha256(value: &Value) -> String {
    sha256_hex(&canonical_json_bytes(value))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    const HEX: &[u8; 16] = b"0123456789abcdef";
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_form_sorts_nested_keys_without_whitespace() {
        let value = json!({"b": [1, {"z": true, "a": null}], "a": "x y"});
        assert_eq!(
            String::from_utf8(canonical_json_bytes(&value)).expect("utf8"),
            r#"{"a":"x y","b":[1,{"a":null,"z":true}]}"#
        );
    }

    #[test]
    fn sha256_of_empty_input_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(is_sha256_hex(&sha256_hex(b"abc")));
        assert!(!is_sha256_hex("ABC"));
    }

    #[test]
    fn canonical_digest_is_stable_across_pretty_write_and_reparse() {
        let value = json!({
            "x": 1.2630655775241807e-5,
            "y": [0.1 + 0.2, 123456.789012345, -9.87654321e-7]
        });
        let written = serde_json::to_vec_pretty(&value).expect("pretty");
        let reread: Value = serde_json::from_slice(&written).expect("reparse");
        assert_eq!(canonical_sha256(&reread), canonical_sha256(&value));
    }
}
