//! Helm-style template filters
//!
//! These extend MiniJinja with the helpers chart templates lean on.

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};

/// Convert a value to YAML
///
/// Usage: {{ values.config | toyaml }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json_value: serde_json::Value = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

    let yaml = serde_yaml::to_string(&json_value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Convert a value to compact JSON
///
/// Usage: {{ values.config | tojson }}
pub fn tojson(value: Value) -> Result<String, Error> {
    let json_value: serde_json::Value = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

    serde_json::to_string(&json_value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

/// Indent every line, prefixed with a newline
///
/// Usage: {{ values.data | toyaml | nindent(2) }}
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Indent every non-empty line
///
/// Usage: {{ content | indent(4) }}
pub fn indent(value: String, spaces: usize) -> String {
    let prefix = " ".repeat(spaces);
    let mut result = String::with_capacity(value.len() + (spaces + 1) * value.lines().count());
    let mut first = true;

    for line in value.lines() {
        if !first {
            result.push('\n');
        }
        first = false;
        if !line.is_empty() {
            result.push_str(&prefix);
            result.push_str(line);
        }
    }
    result
}

/// Quote a string with double quotes
pub fn quote(value: Value) -> String {
    let s = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote a string with single quotes
pub fn squote(value: Value) -> String {
    let s = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    format!("'{}'", s.replace('\'', "''"))
}

/// Base64 encode a string
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// Base64 decode a string
pub fn b64decode(value: String) -> Result<String, Error> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("base64 decode error: {}", e)))?;

    String::from_utf8(decoded)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("UTF-8 decode error: {}", e)))
}

/// Require a value, fail if undefined or empty
///
/// Usage: {{ values.host | required("host is required") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);
    if missing {
        let message = message.unwrap_or_else(|| "required value is missing".to_string());
        return Err(Error::new(ErrorKind::InvalidOperation, message));
    }
    Ok(value)
}

/// Truncate a string to at most `length` characters
pub fn trunc(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

/// Strip a prefix if present
pub fn trimprefix(value: String, prefix: String) -> String {
    value.strip_prefix(&prefix).unwrap_or(&value).to_string()
}

/// Strip a suffix if present
pub fn trimsuffix(value: String, suffix: String) -> String {
    value.strip_suffix(&suffix).unwrap_or(&value).to_string()
}

/// SHA256 hex digest of a string
pub fn sha256sum(value: String) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toyaml_map() {
        let value = Value::from_serialize(serde_json::json!({"foo": "bar", "n": 1}));
        let yaml = toyaml(value).unwrap();
        assert!(yaml.contains("foo: bar"));
        assert!(yaml.contains("n: 1"));
        assert!(!yaml.ends_with('\n'));
    }

    #[test]
    fn test_nindent() {
        assert_eq!(nindent("a: 1\nb: 2".to_string(), 2), "\n  a: 1\n  b: 2");
    }

    #[test]
    fn test_indent_skips_empty_lines() {
        assert_eq!(indent("a\n\nb".to_string(), 2), "  a\n\n  b");
    }

    #[test]
    fn test_quotes() {
        assert_eq!(quote(Value::from("a\"b")), "\"a\\\"b\"");
        assert_eq!(squote(Value::from("it's")), "'it''s'");
    }

    #[test]
    fn test_b64_roundtrip() {
        let encoded = b64encode("secret".to_string());
        assert_eq!(b64decode(encoded).unwrap(), "secret");
    }

    #[test]
    fn test_required() {
        assert!(required(Value::from("x"), None).is_ok());
        let err = required(Value::UNDEFINED, Some("host is required".to_string())).unwrap_err();
        assert!(err.to_string().contains("host is required"));
        assert!(required(Value::from(""), None).is_err());
    }

    #[test]
    fn test_trim_filters() {
        assert_eq!(trimprefix("v1.2.3".to_string(), "v".to_string()), "1.2.3");
        assert_eq!(trimsuffix("name.yaml".to_string(), ".yaml".to_string()), "name");
        assert_eq!(trunc("abcdef".to_string(), 3), "abc");
    }

    #[test]
    fn test_sha256() {
        let digest = sha256sum("hello".to_string());
        assert_eq!(digest.len(), 64);
    }
}
