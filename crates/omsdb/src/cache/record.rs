//! `type$expire$payload` records shared by the cache backends.

use super::CacheValue;
use crate::error::{OmsError, OmsResult};
use regex::Regex;
use std::sync::OnceLock;

/// Field separator of a cache record.
pub(crate) const DELIM: char = '$';

/// Storage-safe form of `key`: anything outside `[A-Za-z0-9_.-]` becomes `~`.
pub(crate) fn sanitize_key(key: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| {
        Regex::new(r"[^A-Za-z0-9_.\-]").expect("invalid built-in cache key regex")
    });
    let name = re.replace_all(key, "~").into_owned();
    // "." and ".." would point at directories.
    if name.chars().all(|c| c == '.') {
        return "~".repeat(name.len());
    }
    name
}

pub(crate) fn build_record(value: &CacheValue, expire: i64) -> String {
    let payload = match value {
        CacheValue::Int(v) => v.to_string(),
        CacheValue::Str(s) => s.clone(),
        CacheValue::Array(json) => json.to_string(),
        CacheValue::Serializable { type_name, payload } => format!("{type_name}{DELIM}{payload}"),
        CacheValue::Float(v) => v.to_string(),
        CacheValue::Bool(v) => String::from(if *v { "1" } else { "0" }),
        CacheValue::JsonSerializable { type_name, payload } => {
            format!("{type_name}{DELIM}{payload}")
        }
    };
    format!("{}{DELIM}{expire}{DELIM}{payload}", value.tag())
}

/// Split a record into its own expiry and value.
pub(crate) fn parse_record(raw: &str) -> OmsResult<(i64, CacheValue)> {
    let malformed = |what: &str| OmsError::Serialization(format!("malformed cache record: {what}"));

    let mut parts = raw.splitn(3, DELIM);
    let (Some(tag), Some(expire), Some(payload)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("missing fields"));
    };
    let expire: i64 = expire.parse().map_err(|_| malformed("expire"))?;

    let value = match tag {
        "0" => CacheValue::Int(payload.parse().map_err(|_| malformed("int payload"))?),
        "1" => CacheValue::Str(payload.to_string()),
        "2" => CacheValue::Array(serde_json::from_str(payload)?),
        "3" | "6" => {
            let (type_name, body) = payload
                .split_once(DELIM)
                .ok_or_else(|| malformed("missing type name"))?;
            if tag == "3" {
                CacheValue::Serializable {
                    type_name: type_name.to_string(),
                    payload: body.to_string(),
                }
            } else {
                CacheValue::JsonSerializable {
                    type_name: type_name.to_string(),
                    payload: serde_json::from_str(body)?,
                }
            }
        }
        "4" => CacheValue::Float(payload.parse().map_err(|_| malformed("float payload"))?),
        "5" => CacheValue::Bool(!matches!(payload, "" | "0")),
        other => return Err(malformed(&format!("unknown type tag '{other}'"))),
    };
    Ok((expire, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sanitised() {
        assert_eq!(sanitize_key("user/42:profile"), "user~42~profile");
        assert_eq!(sanitize_key(".."), "~~");
        assert_eq!(sanitize_key("a.b-c_d"), "a.b-c_d");
        assert_eq!(sanitize_key("with space"), "with~space");
    }

    #[test]
    fn serialized_objects_keep_their_type_name() {
        let value = CacheValue::JsonSerializable {
            type_name: "app::Session".to_string(),
            payload: serde_json::json!({"id": 1}),
        };
        let record = build_record(&value, 60);
        assert_eq!(record, "6$60$app::Session${\"id\":1}");
        assert_eq!(parse_record(&record).unwrap(), (60, value));
    }

    #[test]
    fn malformed_records_are_errors() {
        assert!(parse_record("0$-1").is_err());
        assert!(parse_record("9$-1$x").is_err());
        assert!(parse_record("0$soon$1").is_err());
        assert!(parse_record("3$-1$no-type-name").is_err());
    }
}
