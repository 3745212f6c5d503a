//! `{placeholder}` substitution for model-routed request templates.
//!
//! `{{` and `}}` produce literal braces. String arguments are inserted as-is,
//! anything else in its JSON text form.

use switchboard_core::error::{FlowError, Result};

pub fn render(node: &str, template: &str, args: &serde_json::Value) -> Result<String> {
    let fail = |message: String| FlowError::Template {
        node: node.to_string(),
        message,
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if !closed {
                    return Err(fail("single '{' encountered in template".into()));
                }
                let value = args
                    .get(key.trim())
                    .ok_or_else(|| fail(format!("missing argument '{}'", key.trim())))?;
                match value {
                    serde_json::Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(fail("single '}' encountered in template".into())),
            _ => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitutes_strings_and_numbers() {
        let out = render(
            "status_processing",
            "Order ID: {order_id}\nCurrent Status: {status}",
            &json!({"order_id": 555, "status": "shipped"}),
        )
        .unwrap();
        assert_eq!(out, "Order ID: 555\nCurrent Status: shipped");
    }

    #[test]
    fn test_structured_values_render_as_json() {
        let out = render(
            "status_processing",
            "Traces: {tracking_events}",
            &json!({"tracking_events": [{"event": "Order placed"}]}),
        )
        .unwrap();
        assert_eq!(out, r#"Traces: [{"event":"Order placed"}]"#);
    }

    #[test]
    fn test_escaped_braces() {
        let out = render("root", "{{literal}} {user_message}", &json!({"user_message": "hi"})).unwrap();
        assert_eq!(out, "{literal} hi");
    }

    #[test]
    fn test_missing_argument() {
        let err = render("root", "User message: {user_message}", &json!({})).unwrap_err();
        assert!(matches!(err, FlowError::Template { .. }));
        assert!(err.to_string().contains("user_message"));
    }

    #[test]
    fn test_non_object_args_fail_only_with_placeholders() {
        assert_eq!(render("n", "no placeholders", &json!("text")).unwrap(), "no placeholders");
        assert!(render("n", "{user_message}", &json!("text")).is_err());
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(render("n", "oops {user_message", &json!({"user_message": "x"})).is_err());
        assert!(render("n", "oops } here", &json!({})).is_err());
    }
}
