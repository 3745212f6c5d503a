use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use switchboard_core::error::{FlowError, Result};
use switchboard_core::types::ToolDefinition;

/// Declaration of one node parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// Anything else the declaration carries (`default`, `enum`, ...),
    /// forwarded untouched to the model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ParamSpec {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Ordered parameter schema of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    params: Vec<(String, ParamSpec)>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.insert(name.into(), ParamSpec::new(kind, description));
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, "string", description)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, "integer", description)
    }

    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, "boolean", description)
    }

    fn insert(&mut self, name: String, spec: ParamSpec) {
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.params.push((name, spec)),
        }
    }

    /// Parse a JSON object of `name -> {type, description, ...}` declarations.
    ///
    /// `node` is only used in error messages.
    pub fn from_json(node: &str, value: &serde_json::Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| FlowError::MalformedParameter {
            node: node.to_string(),
            param: "*".to_string(),
            reason: "parameters must be a JSON object".to_string(),
        })?;

        let mut schema = Self::new();
        for (name, details) in obj {
            let malformed = |reason: &str| FlowError::MalformedParameter {
                node: node.to_string(),
                param: name.clone(),
                reason: reason.to_string(),
            };
            let details = details
                .as_object()
                .ok_or_else(|| malformed("details must be an object"))?;
            let kind = details
                .get("type")
                .and_then(|v| v.as_str())
                .ok_or_else(|| malformed("missing 'type' field"))?;
            let description = details
                .get("description")
                .and_then(|v| v.as_str())
                .ok_or_else(|| malformed("missing 'description' field"))?;

            let extra = details
                .iter()
                .filter(|(k, _)| k.as_str() != "type" && k.as_str() != "description")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            schema.insert(
                name.clone(),
                ParamSpec {
                    kind: kind.to_string(),
                    description: description.to_string(),
                    extra,
                },
            );
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParamSpec> {
        self.params.iter_mut().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// JSON-schema `properties` object, in declaration order.
    pub fn properties(&self) -> serde_json::Value {
        let map = self
            .params
            .iter()
            .map(|(name, spec)| {
                let value = serde_json::to_value(spec).unwrap_or(serde_json::Value::Null);
                (name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static pattern"))
}

/// Node names double as tool names, so they follow the tool-name pattern.
pub fn validate_name(name: &str) -> Result<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(FlowError::InvalidNodeName(name.to_string()))
    }
}

/// Every declared parameter, in order.
pub fn default_required(schema: &ParamSchema) -> Vec<String> {
    schema.names().map(str::to_string).collect()
}

/// Resolve the effective required set.
///
/// An empty list means "all parameters". The literal `"None"` marks a node
/// that requires nothing and is dropped from the result.
pub fn resolve_required(node: &str, schema: &ParamSchema, required: &[String]) -> Result<Vec<String>> {
    if required.is_empty() {
        return Ok(default_required(schema));
    }
    let mut resolved = Vec::with_capacity(required.len());
    for name in required {
        if name == "None" {
            continue;
        }
        if !schema.contains(name) {
            return Err(FlowError::UnknownRequired {
                node: node.to_string(),
                param: name.clone(),
            });
        }
        if !resolved.contains(name) {
            resolved.push(name.clone());
        }
    }
    Ok(resolved)
}

/// Package a node as a callable-tool description.
pub fn descriptor(
    name: &str,
    description: &str,
    schema: &ParamSchema,
    required: &[String],
) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": schema.properties(),
            "required": required,
            "additionalProperties": false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_names() {
        for name in ["root", "Cancell_Order", "orderID_request2", "a-b_c", "9"] {
            assert!(validate_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "with space", "dot.ted", "slash/ed", "émoji", "tab\t"] {
            assert!(
                matches!(validate_name(name), Err(FlowError::InvalidNodeName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_json_keeps_order_and_extras() {
        let schema = ParamSchema::from_json(
            "backup_system",
            &json!({
                "user_message": {"type": "string", "description": "latest message"},
                "route_info": {"type": "string", "description": "pipeline"},
                "error_type": {"type": "string", "description": "kind", "default": "unspecified"}
            }),
        )
        .unwrap();

        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, vec!["user_message", "route_info", "error_type"]);
        assert_eq!(
            schema.get("error_type").unwrap().extra.get("default"),
            Some(&json!("unspecified"))
        );
    }

    #[test]
    fn test_from_json_missing_type() {
        let err = ParamSchema::from_json(
            "root",
            &json!({"user_message": {"description": "message sent by the user"}}),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::MalformedParameter { ref param, .. } if param == "user_message"));
    }

    #[test]
    fn test_from_json_missing_description() {
        let err =
            ParamSchema::from_json("root", &json!({"order_id": {"type": "integer"}})).unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_from_json_not_an_object() {
        assert!(ParamSchema::from_json("root", &json!(["user_message"])).is_err());
        assert!(ParamSchema::from_json("root", &json!({"user_message": "string"})).is_err());
    }

    #[test]
    fn test_required_defaults_to_all() {
        let schema = ParamSchema::new()
            .integer("order_id", "Order identification numeric code")
            .string("system_message", "chat bot message");
        let required = resolve_required("status_check", &schema, &[]).unwrap();
        assert_eq!(required, vec!["order_id", "system_message"]);
    }

    #[test]
    fn test_required_subset_and_none_literal() {
        let schema = ParamSchema::new()
            .integer("order_id", "id")
            .boolean("sms_notifications", "sms")
            .string("system_message", "msg");
        let required = resolve_required(
            "update_notifications",
            &schema,
            &["system_message".into(), "order_id".into()],
        )
        .unwrap();
        assert_eq!(required, vec!["system_message", "order_id"]);

        let none = resolve_required("x", &schema, &["None".into()]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_required_unknown_name() {
        let schema = ParamSchema::new().string("user_message", "msg");
        let err = resolve_required("root", &schema, &["order_id".into()]).unwrap_err();
        assert!(matches!(err, FlowError::UnknownRequired { .. }));
    }

    #[test]
    fn test_descriptor_shape() {
        let schema = ParamSchema::new().string("user_message", "message sent by the user");
        let tool = descriptor(
            "root",
            "Entry point to determine user intent",
            &schema,
            &default_required(&schema),
        );
        assert_eq!(tool.name, "root");
        assert_eq!(
            tool.input_schema,
            json!({
                "type": "object",
                "properties": {
                    "user_message": {"type": "string", "description": "message sent by the user"}
                },
                "required": ["user_message"],
                "additionalProperties": false
            })
        );
    }
}
