use serde::{Deserialize, Serialize};

use switchboard_core::types::SessionId;

/// Data collected by interactive nodes (order details, verification state...).
///
/// Visible to every node invoked after the merge, in the same turn or in a
/// resumed one, until a terminal leaf clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData {
    data: serde_json::Map<String, serde_json::Value>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Merge callback data (overwrites on conflict).
    pub fn merge(&mut self, other: serde_json::Map<String, serde_json::Value>) {
        for (k, v) in other {
            self.data.insert(k, v);
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.data
    }

    /// Compact JSON rendering used when the data is shown to a model.
    pub fn to_json_string(&self) -> String {
        serde_json::Value::Object(self.data.clone()).to_string()
    }
}

/// Per-conversation state that survives between turns.
///
/// Owned by the caller and handed to every `run_from` call of that
/// conversation; two conversations never share one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    data: SessionData,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            data: SessionData::new(),
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_operations() {
        let mut data = SessionData::new();
        data.set("status", json!("processing"));
        data.set("order_id", json!(555));

        assert_eq!(data.get_str("status"), Some("processing"));
        assert_eq!(data.get("order_id"), Some(&json!(555)));
        assert_eq!(data.get("missing"), None);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut data = SessionData::new();
        data.set("status", json!("pending"));
        data.set("customer_name", json!("Ada"));

        let mut callback = serde_json::Map::new();
        callback.insert("status".into(), json!("cancelled"));
        callback.insert("total_amount".into(), json!(120.5));
        data.merge(callback);

        assert_eq!(data.get_str("status"), Some("cancelled"));
        assert_eq!(data.get_str("customer_name"), Some("Ada"));
        assert_eq!(data.get("total_amount"), Some(&json!(120.5)));
    }

    #[test]
    fn test_clear() {
        let mut data = SessionData::new();
        data.set("a", json!(1));
        data.clear();
        assert!(data.is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = Session::new();
        let b = Session::new();
        a.data_mut().set("order_id", json!(1));
        assert!(b.data().is_empty());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_session_serializes_data_transparently() {
        let mut session = Session::with_id(SessionId::from_str("conv-1"));
        session.data_mut().set("order_id", json!(555));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json, json!({"id": "conv-1", "data": {"order_id": 555}}));

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back.data().get("order_id"), Some(&json!(555)));
    }
}
