// src/pipeline/fields.rs - Field coercions shared by every stage
use serde_json::Value;

/// String spellings accepted as a true flag (compared trimmed, lowercase).
pub const TRUTHY_STRINGS: &[&str] = &["true", "1", "yes", "y", "t", "on"];

/// UTM sources look like `source_to_destination`.
pub const UTM_SEPARATOR: &str = "_to_";

pub fn is_nonempty_str(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.trim().is_empty())
}

pub fn is_valid_utm_source(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => {
            let s = s.trim();
            !s.is_empty() && s.contains(UTM_SEPARATOR)
        }
        _ => false,
    }
}

/// Coerce a loosely typed flag into a bool.
pub fn is_truthy_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => {
            let s = s.trim().to_lowercase();
            TRUTHY_STRINGS.contains(&s.as_str())
        }
        _ => false,
    }
}

/// JSON values that count as "nothing": null, false, zero, and empty
/// strings/arrays/objects.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Text written to a CSV cell. Booleans are spelled `True`/`False`, the
/// form existing funnel extracts already use.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cell text, trimmed; a missing field is the empty string.
pub fn stringify_trimmed(value: Option<&Value>) -> String {
    value.map(|v| cell_text(v).trim().to_string()).unwrap_or_default()
}

/// Trim strings, blank out falsy values, pass anything else through.
pub fn trimmed_or_blank(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => Value::String(s.trim().to_string()),
        Some(v) if !is_falsy(v) => v.clone(),
        _ => Value::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy_flag() {
        for truthy in [json!(true), json!(1), json!(-2.5), json!(" YES "), json!("t"), json!("On")] {
            assert!(is_truthy_flag(Some(&truthy)), "{} should be truthy", truthy);
        }
        for falsy in [
            json!(false),
            json!(0),
            json!(0.0),
            json!("no"),
            json!("false"),
            json!(""),
            json!(null),
            json!([1]),
            json!({"a": 1}),
        ] {
            assert!(!is_truthy_flag(Some(&falsy)), "{} should be falsy", falsy);
        }
        assert!(!is_truthy_flag(None));
    }

    #[test]
    fn test_utm_source_shape() {
        assert!(is_valid_utm_source(Some(&json!("fb_to_app"))));
        assert!(is_valid_utm_source(Some(&json!("  tiktok_to_pwa "))));
        assert!(!is_valid_utm_source(Some(&json!("fbapp"))));
        assert!(!is_valid_utm_source(Some(&json!("_to"))));
        assert!(!is_valid_utm_source(Some(&json!(42))));
        assert!(!is_valid_utm_source(None));
    }

    #[test]
    fn test_nonempty_str() {
        assert!(is_nonempty_str(Some(&json!("x"))));
        assert!(!is_nonempty_str(Some(&json!("  "))));
        assert!(!is_nonempty_str(Some(&json!(7))));
        assert!(!is_nonempty_str(None));
    }

    #[test]
    fn test_stringify_trimmed() {
        assert_eq!(stringify_trimmed(Some(&json!(" ABC "))), "ABC");
        assert_eq!(stringify_trimmed(Some(&json!(123))), "123");
        assert_eq!(stringify_trimmed(Some(&json!(null))), "");
        assert_eq!(stringify_trimmed(None), "");
    }

    #[test]
    fn test_stringify_trimmed_spells_booleans() {
        assert_eq!(stringify_trimmed(Some(&json!(true))), "True");
        assert_eq!(stringify_trimmed(Some(&json!(" 42 "))), "42");
        assert_eq!(stringify_trimmed(Some(&json!(null))), "");
    }

    #[test]
    fn test_trimmed_or_blank() {
        assert_eq!(trimmed_or_blank(Some(&json!(" pass "))), json!("pass"));
        assert_eq!(trimmed_or_blank(Some(&json!(0))), json!(""));
        assert_eq!(trimmed_or_blank(Some(&json!(false))), json!(""));
        assert_eq!(trimmed_or_blank(Some(&json!(3))), json!(3));
        assert_eq!(trimmed_or_blank(None), json!(""));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!("a,b")), "a,b");
        assert_eq!(cell_text(&json!(true)), "True");
        assert_eq!(cell_text(&json!(false)), "False");
        assert_eq!(cell_text(&json!(12)), "12");
        assert_eq!(cell_text(&json!({"k": 1})), r#"{"k":1}"#);
    }
}
